fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/movie_mesh.proto");

    // 未显式指定 protoc 时使用内置版本
    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path()?;
        // SAFETY: build script 在此处仍是单线程
        unsafe {
            std::env::set_var("PROTOC", protoc);
        }
    }

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/movie_mesh.proto"], &["proto"])?;

    Ok(())
}
