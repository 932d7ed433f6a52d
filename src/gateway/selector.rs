use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// 从存活地址列表中选出一个地址
pub trait AddressSelector: Send + Sync + std::fmt::Debug {
    fn select(&self, addresses: &[String]) -> Option<String>;
}

/// 选择策略配置
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    #[default]
    First,
    RoundRobin,
    Random,
}

impl SelectionPolicy {
    pub fn build(self) -> Arc<dyn AddressSelector> {
        match self {
            Self::First => Arc::new(FirstAddress),
            Self::RoundRobin => Arc::new(RoundRobin::default()),
            Self::Random => Arc::new(RandomAddress),
        }
    }
}

// 取解析结果中的第一个地址
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstAddress;

impl AddressSelector for FirstAddress {
    fn select(&self, addresses: &[String]) -> Option<String> {
        addresses.first().cloned()
    }
}

/// 轮询选择
///
/// 注册表返回的顺序不稳定，先排序再按游标取模。
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl AddressSelector for RoundRobin {
    fn select(&self, addresses: &[String]) -> Option<String> {
        if addresses.is_empty() {
            return None;
        }
        let mut sorted: Vec<&String> = addresses.iter().collect();
        sorted.sort();

        let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
        Some(sorted[idx % sorted.len()].clone())
    }
}

// 随机选择
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomAddress;

impl AddressSelector for RandomAddress {
    fn select(&self, addresses: &[String]) -> Option<String> {
        if addresses.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..addresses.len());
        Some(addresses[idx].clone())
    }
}
