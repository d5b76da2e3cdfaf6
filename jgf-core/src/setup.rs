//! 实体描述（[`Setup`]）与类型化配置读取接口（[`ConfigReader`]）。
//!
//! 描述文件是一棵“节点 + 属性”的树，以 RON 文本保存：
//!
//! ```
//! use jgf_core::setup::{ConfigReader, Setup};
//!
//! let setup = Setup::from_ron(
//!     r#"(
//!         class: "footman",
//!         nodes: [
//!             (name: "attacker", attributes: {"time": "2", "distanceMin": "0", "distanceMax": "2",
//!                                             "damagesMin": "1", "damagesMax": "3"}),
//!         ],
//!     )"#,
//! )
//! .unwrap();
//!
//! let attacker = setup.require_node("attacker").unwrap();
//! assert_eq!(attacker.read::<u32>("time").unwrap(), 2);
//! ```
//!
//! 特性只依赖 [`ConfigReader`]，因此描述的来源（RON、编辑器导出、测试里手写）对它们是透明的。

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::Deserialize;

/// 描述树中的一个节点。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConfigNode {
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub children: Vec<ConfigNode>,
}

impl ConfigNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder 风格：追加一个属性。
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.insert(name.into(), value.to_string());
        self
    }

    /// Builder 风格：追加一个子节点。
    pub fn with_child(mut self, child: ConfigNode) -> Self {
        self.children.push(child);
        self
    }

    /// 第一个名为 `name` 的子节点。
    pub fn child(&self, name: &str) -> Option<&ConfigNode> {
        self.children.iter().find(|child| child.name == name)
    }

    /// 所有名为 `name` 的子节点（保持声明顺序）。
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ConfigNode> {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.contains_key(attribute)
    }

    /// 读取原始字符串属性。
    pub fn read_str(&self, attribute: &str) -> Result<&str, ConfigError> {
        self.attributes
            .get(attribute)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::MissingAttribute {
                node: self.name.clone(),
                attribute: attribute.to_owned(),
            })
    }

    /// 读取并解析属性；缺失或格式错误都会返回错误。
    pub fn read<T: FromStr>(&self, attribute: &str) -> Result<T, ConfigError> {
        let raw = self.read_str(attribute)?;
        self.parse(attribute, raw)
    }

    /// 带默认值的读取：只有属性**缺失**时才使用 `default`，格式错误依然报错。
    pub fn read_or<T: FromStr>(&self, default: T, attribute: &str) -> Result<T, ConfigError> {
        match self.attributes.get(attribute) {
            Some(raw) => self.parse(attribute, raw),
            None => Ok(default),
        }
    }

    fn parse<T: FromStr>(&self, attribute: &str, raw: &str) -> Result<T, ConfigError> {
        raw.trim().parse().map_err(|_| ConfigError::Malformed {
            node: self.name.clone(),
            attribute: attribute.to_owned(),
            value: raw.to_owned(),
        })
    }
}

/// 类型化配置读取接口。
///
/// 路径以 `/` 分隔，逐级匹配子节点名，例如 `"actions/action"`。
pub trait ConfigReader {
    /// 按路径查找节点。
    fn node(&self, path: &str) -> Option<&ConfigNode>;

    fn has_node(&self, path: &str) -> bool {
        self.node(path).is_some()
    }

    /// 按路径查找节点，缺失时返回 [`ConfigError::MissingNode`]。
    fn require_node(&self, path: &str) -> Result<&ConfigNode, ConfigError> {
        self.node(path).ok_or_else(|| ConfigError::MissingNode {
            node: path.to_owned(),
        })
    }
}

/// 一个实体的完整描述：类名 + 配置节点。
///
/// `class` 决定 [`Factory`](crate::game::factory::Factory) 用哪个构造器组装实体。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Setup {
    pub class: String,
    #[serde(default)]
    pub nodes: Vec<ConfigNode>,
}

impl Setup {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            nodes: Vec::new(),
        }
    }

    /// 从 RON 文本解析描述。
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        ron::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Builder 风格：追加一个顶层节点。
    pub fn with_node(mut self, node: ConfigNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn class(&self) -> &str {
        &self.class
    }
}

impl ConfigReader for Setup {
    fn node(&self, path: &str) -> Option<&ConfigNode> {
        let mut segments = path.split('/').filter(|segment| !segment.is_empty());
        let first = segments.next()?;
        let mut current = self.nodes.iter().find(|node| node.name == first)?;
        for segment in segments {
            current = current.child(segment)?;
        }
        Some(current)
    }
}

/// 配置错误：描述缺失、格式错误或取值不合法。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingNode {
        node: String,
    },
    MissingAttribute {
        node: String,
        attribute: String,
    },
    Malformed {
        node: String,
        attribute: String,
        value: String,
    },
    InvalidRange {
        node: String,
        min: i32,
        max: i32,
    },
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingNode { node } => write!(f, "缺少配置节点 {node}"),
            ConfigError::MissingAttribute { node, attribute } => {
                write!(f, "配置节点 {node} 缺少属性 {attribute}")
            }
            ConfigError::Malformed {
                node,
                attribute,
                value,
            } => write!(f, "配置节点 {node} 的属性 {attribute} 取值非法: {value:?}"),
            ConfigError::InvalidRange { node, min, max } => {
                write!(f, "配置节点 {node} 的区间非法: 最小值 {min} 大于最大值 {max}")
            }
            ConfigError::Parse(message) => write!(f, "描述解析失败: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    const FOOTMAN: &str = r#"(
        class: "footman",
        nodes: [
            (name: "attacker", attributes: {"time": "5", "distanceMin": "1", "distanceMax": "x"}),
            (
                name: "actions",
                children: [
                    (name: "action", attributes: {"name": "move"}),
                    (name: "action", attributes: {"name": "attack", "cancel": "true"}),
                ],
            ),
        ],
    )"#;

    #[test]
    fn from_ron_reads_class_and_nodes() {
        let setup = Setup::from_ron(FOOTMAN).expect("描述应能解析");
        assert_eq!(setup.class(), "footman");
        assert!(setup.has_node("attacker"));
        assert!(setup.has_node("actions/action"));
        assert!(!setup.has_node("layerable"));
    }

    #[test]
    fn read_parses_typed_attributes() {
        let setup = Setup::from_ron(FOOTMAN).unwrap();
        let attacker = setup.require_node("attacker").unwrap();
        assert_eq!(attacker.read::<u32>("time").unwrap(), 5);
        assert_eq!(attacker.read::<i32>("distanceMin").unwrap(), 1);
    }

    #[test]
    fn malformed_value_is_an_error_even_with_default() {
        let setup = Setup::from_ron(FOOTMAN).unwrap();
        let attacker = setup.require_node("attacker").unwrap();

        let err = attacker
            .read_or::<i32>(0, "distanceMax")
            .expect_err("格式错误不应被默认值吞掉");
        assert_eq!(
            err,
            ConfigError::Malformed {
                node: "attacker".into(),
                attribute: "distanceMax".into(),
                value: "x".into(),
            }
        );
        assert_eq!(attacker.read_or::<i32>(7, "cooldown").unwrap(), 7);
    }

    #[test]
    fn missing_node_and_attribute_are_reported() {
        let setup = Setup::from_ron(FOOTMAN).unwrap();
        assert_eq!(
            setup.require_node("layerable").unwrap_err(),
            ConfigError::MissingNode {
                node: "layerable".into()
            }
        );

        let attacker = setup.require_node("attacker").unwrap();
        assert!(matches!(
            attacker.read::<i32>("damagesMin"),
            Err(ConfigError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn children_keep_declaration_order() {
        let setup = Setup::from_ron(FOOTMAN).unwrap();
        let names: Vec<&str> = setup
            .require_node("actions")
            .unwrap()
            .children_named("action")
            .map(|action| action.read_str("name").unwrap())
            .collect();
        assert_eq!(names, ["move", "attack"]);
    }

    #[test]
    fn invalid_text_is_a_parse_error() {
        assert!(matches!(
            Setup::from_ron("(class: )"),
            Err(ConfigError::Parse(_))
        ));
    }
}
