use crate::pb;

pub type MovieId = i32;

/// 评分取值范围
pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

// 电影元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub id: MovieId,
    pub title: String,
    pub year: i32,
    pub description: String,
    pub director: String,
}

/// 尚未分配 ID 的元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMetadata {
    pub title: String,
    pub year: i32,
    pub description: String,
    pub director: String,
}

impl NewMetadata {
    pub fn with_id(self, id: MovieId) -> Metadata {
        Metadata {
            id,
            title: self.title,
            year: self.year,
            description: self.description,
            director: self.director,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rating {
    pub movie_id: MovieId,
    pub value: i32,
}

// 聚合后的电影详情
#[derive(Debug, Clone, PartialEq)]
pub struct MovieDetails {
    pub rating: Option<f64>,
    pub metadata: Metadata,
}

impl From<pb::Metadata> for Metadata {
    fn from(m: pb::Metadata) -> Self {
        Self {
            id: m.id,
            title: m.title,
            year: m.year,
            description: m.description,
            director: m.director,
        }
    }
}

impl From<Metadata> for pb::Metadata {
    fn from(m: Metadata) -> Self {
        Self {
            id: m.id,
            title: m.title,
            year: m.year,
            description: m.description,
            director: m.director,
        }
    }
}

impl From<pb::PutMetadataRequest> for NewMetadata {
    fn from(req: pb::PutMetadataRequest) -> Self {
        Self {
            title: req.title,
            year: req.year,
            description: req.description,
            director: req.director,
        }
    }
}

impl From<MovieDetails> for pb::MovieDetails {
    fn from(details: MovieDetails) -> Self {
        Self {
            rating: details.rating,
            metadata: Some(details.metadata.into()),
        }
    }
}
