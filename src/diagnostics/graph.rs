// 依赖图模块 - 记录服务之间的依赖关系，用于循环检测和诊断
use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::container::ServiceKey;

/// 服务节点状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceStatus {
    /// 尚未创建过实例
    NotInitialized,
    /// 正在创建
    Initializing,
    /// 创建成功
    Initialized,
    /// 最近一次创建失败
    Error,
    /// 缓存实例已释放
    Disposed,
}

/// 图节点 - 每个已注册服务键一个
#[derive(Debug, Clone)]
pub struct ServiceNode {
    pub key: ServiceKey,
    pub name: String,
    /// 有序的依赖键
    pub dependencies: Vec<ServiceKey>,
    /// 反向依赖（依赖本节点的服务）
    pub dependents: Vec<ServiceKey>,
    pub status: ServiceStatus,
    pub resolve_count: u64,
    pub last_access: Option<DateTime<Utc>>,
    pub initialized_at: Option<DateTime<Utc>>,
}

impl ServiceNode {
    fn new(key: ServiceKey, name: String) -> Self {
        Self {
            key,
            name,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            status: ServiceStatus::NotInitialized,
            resolve_count: 0,
            last_access: None,
            initialized_at: None,
        }
    }
}

/// 依赖图
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: HashMap<ServiceKey, ServiceNode>,
}

/// DFS 三色标记
#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

impl DependencyGraph {
    /// 创建新的依赖图
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加服务节点（已存在时只更新名称）
    pub fn add_service(&mut self, key: ServiceKey, name: impl Into<String>) {
        let name = name.into();
        if let Some(node) = self.nodes.get_mut(&key) {
            node.name = name;
            return;
        }

        let mut node = ServiceNode::new(key, name);
        // 在本节点注册之前就声明了对它依赖的服务
        let mut dependents: Vec<ServiceKey> = self
            .nodes
            .values()
            .filter(|other| other.dependencies.contains(&key))
            .map(|other| other.key)
            .collect();
        dependents.sort();
        node.dependents = dependents;
        self.nodes.insert(key, node);
    }

    /// 重新注册时重置节点：清空依赖边和状态
    pub fn reset_service(&mut self, key: ServiceKey, name: impl Into<String>) {
        let old_dependencies = match self.nodes.get_mut(&key) {
            Some(node) => {
                node.status = ServiceStatus::NotInitialized;
                node.initialized_at = None;
                std::mem::take(&mut node.dependencies)
            }
            None => Vec::new(),
        };
        for dependency in old_dependencies {
            if let Some(target) = self.nodes.get_mut(&dependency) {
                target.dependents.retain(|k| *k != key);
            }
        }
        self.add_service(key, name);
    }

    /// 添加一条有向边 from -> to；返回是否为新边
    pub fn add_dependency(&mut self, from: ServiceKey, to: ServiceKey) -> bool {
        let Some(node) = self.nodes.get_mut(&from) else {
            return false;
        };
        if node.dependencies.contains(&to) {
            return false;
        }
        node.dependencies.push(to);

        if let Some(target) = self.nodes.get_mut(&to) {
            if !target.dependents.contains(&from) {
                target.dependents.push(from);
            }
        }
        true
    }

    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn node(&self, key: &ServiceKey) -> Option<&ServiceNode> {
        self.nodes.get(key)
    }

    /// 按名称排序的全部节点
    pub fn nodes(&self) -> Vec<&ServiceNode> {
        let mut nodes: Vec<&ServiceNode> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.key.cmp(&b.key));
        nodes
    }

    /// 获取节点的所有直接依赖
    pub fn get_dependencies(&self, key: &ServiceKey) -> Vec<ServiceKey> {
        self.nodes
            .get(key)
            .map(|node| node.dependencies.clone())
            .unwrap_or_default()
    }

    /// 获取依赖某节点的所有节点
    pub fn get_dependents(&self, key: &ServiceKey) -> Vec<ServiceKey> {
        self.nodes
            .get(key)
            .map(|node| node.dependents.clone())
            .unwrap_or_default()
    }

    /// 记录一次访问
    pub fn record_service_access(&mut self, key: &ServiceKey) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.resolve_count += 1;
            node.last_access = Some(Utc::now());
        }
    }

    /// 更新节点状态
    pub fn update_service_status(&mut self, key: &ServiceKey, status: ServiceStatus) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.status = status;
            if status == ServiceStatus::Initialized && node.initialized_at.is_none() {
                node.initialized_at = Some(Utc::now());
            }
        }
    }

    /// 三色 DFS：存在指向灰色节点的回边即有环
    pub fn detect_circular_dependencies(&self) -> bool {
        let mut colors: HashMap<ServiceKey, Color> =
            self.nodes.keys().map(|key| (*key, Color::White)).collect();

        for key in self.sorted_keys() {
            if colors.get(&key) == Some(&Color::White) && self.visit_has_back_edge(key, &mut colors) {
                return true;
            }
        }
        false
    }

    fn visit_has_back_edge(&self, key: ServiceKey, colors: &mut HashMap<ServiceKey, Color>) -> bool {
        colors.insert(key, Color::Gray);
        if let Some(node) = self.nodes.get(&key) {
            for dependency in &node.dependencies {
                match colors.get(dependency) {
                    Some(Color::Gray) => return true,
                    Some(Color::White) => {
                        if self.visit_has_back_edge(*dependency, colors) {
                            return true;
                        }
                    }
                    // 已完成的节点，或指向未注册服务的边
                    Some(Color::Black) | None => {}
                }
            }
        }
        colors.insert(key, Color::Black);
        false
    }

    /// 检测环路，返回每个环上的节点序列
    pub fn find_cycles(&self) -> Vec<Vec<ServiceKey>> {
        let mut cycles = Vec::new();
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for key in self.sorted_keys() {
            if !visited.contains(&key) {
                self.dfs_cycle_detection(key, &mut visited, &mut rec_stack, &mut path, &mut cycles);
            }
        }

        cycles
    }

    /// DFS环路检测辅助函数
    fn dfs_cycle_detection(
        &self,
        key: ServiceKey,
        visited: &mut HashSet<ServiceKey>,
        rec_stack: &mut HashSet<ServiceKey>,
        path: &mut Vec<ServiceKey>,
        cycles: &mut Vec<Vec<ServiceKey>>,
    ) {
        visited.insert(key);
        rec_stack.insert(key);
        path.push(key);

        if let Some(node) = self.nodes.get(&key) {
            for neighbor in &node.dependencies {
                if !self.nodes.contains_key(neighbor) {
                    continue;
                }
                if !visited.contains(neighbor) {
                    self.dfs_cycle_detection(*neighbor, visited, rec_stack, path, cycles);
                } else if rec_stack.contains(neighbor) {
                    if let Some(start_idx) = path.iter().position(|k| k == neighbor) {
                        cycles.push(path[start_idx..].to_vec());
                    }
                }
            }
        }

        path.pop();
        rec_stack.remove(&key);
    }

    /// 深度受限的依赖树文本
    pub fn get_dependency_tree(&self, key: &ServiceKey, max_depth: usize) -> String {
        let mut out = String::new();
        match self.nodes.get(key) {
            Some(node) => {
                out.push_str(&self.describe(node));
                out.push('\n');
                let mut path = vec![*key];
                self.render_children(node, "", 1, max_depth, &mut path, &mut out);
            }
            None => {
                out.push_str(&format!("{key} (not registered)\n"));
            }
        }
        out
    }

    fn render_children(
        &self,
        node: &ServiceNode,
        prefix: &str,
        depth: usize,
        max_depth: usize,
        path: &mut Vec<ServiceKey>,
        out: &mut String,
    ) {
        if node.dependencies.is_empty() {
            return;
        }
        if depth > max_depth {
            out.push_str(&format!(
                "{prefix}└── ... ({} more)\n",
                node.dependencies.len()
            ));
            return;
        }

        let last_index = node.dependencies.len() - 1;
        for (index, dependency) in node.dependencies.iter().enumerate() {
            let is_last = index == last_index;
            let branch = if is_last { "└── " } else { "├── " };
            let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });

            match self.nodes.get(dependency) {
                Some(child) if path.contains(dependency) => {
                    out.push_str(&format!("{prefix}{branch}{} (circular)\n", child.name));
                }
                Some(child) => {
                    out.push_str(&format!("{prefix}{branch}{}\n", self.describe(child)));
                    path.push(*dependency);
                    self.render_children(child, &child_prefix, depth + 1, max_depth, path, out);
                    path.pop();
                }
                None => {
                    out.push_str(&format!("{prefix}{branch}{dependency} (not registered)\n"));
                }
            }
        }
    }

    fn describe(&self, node: &ServiceNode) -> String {
        format!(
            "{} [{:?}, resolved {}x]",
            node.name, node.status, node.resolve_count
        )
    }

    /// 获取图的统计信息
    pub fn get_statistics(&self) -> GraphStatistics {
        let edge_count: usize = self.nodes.values().map(|n| n.dependencies.len()).sum();
        let mut status_counts = BTreeMap::new();
        for node in self.nodes.values() {
            *status_counts.entry(format!("{:?}", node.status)).or_insert(0) += 1;
        }

        GraphStatistics {
            node_count: self.nodes.len(),
            edge_count,
            cycle_count: self.find_cycles().len(),
            average_fan_out: if self.nodes.is_empty() {
                0.0
            } else {
                edge_count as f64 / self.nodes.len() as f64
            },
            max_fan_out: self
                .nodes
                .values()
                .map(|n| n.dependencies.len())
                .max()
                .unwrap_or(0),
            status_counts,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    fn sorted_keys(&self) -> Vec<ServiceKey> {
        let mut keys: Vec<ServiceKey> = self.nodes.keys().copied().collect();
        keys.sort();
        keys
    }
}

/// 图的统计信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub node_count: usize,
    pub edge_count: usize,
    pub cycle_count: usize,
    pub average_fan_out: f64,
    pub max_fan_out: usize,
    pub status_counts: BTreeMap<String, usize>,
}

impl GraphStatistics {
    /// 平铺为键值映射
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("node_count".to_string(), self.node_count as f64);
        map.insert("edge_count".to_string(), self.edge_count as f64);
        map.insert("cycle_count".to_string(), self.cycle_count as f64);
        map.insert("average_fan_out".to_string(), self.average_fan_out);
        map.insert("max_fan_out".to_string(), self.max_fan_out as f64);
        for (status, count) in &self.status_counts {
            map.insert(format!("status.{status}"), *count as f64);
        }
        map
    }
}
