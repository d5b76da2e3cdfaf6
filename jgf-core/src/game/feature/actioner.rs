use crate::{
    game::feature::Feature,
    setup::{ConfigError, ConfigNode, ConfigReader},
};

/// 一个可执行动作的引用。`refs` 为该动作展开后的子动作。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRef {
    pub name: String,
    pub cancel: bool,
    pub refs: Vec<ActionRef>,
}

impl ActionRef {
    fn imports(node: &ConfigNode) -> Result<Self, ConfigError> {
        Ok(Self {
            name: node.read_str("name")?.to_owned(),
            cancel: node.read_or(false, "cancel")?,
            refs: node
                .children_named("action")
                .map(ActionRef::imports)
                .collect::<Result<_, _>>()?,
        })
    }
}

/// 实体允许执行的动作列表，取自描述的 `actions` 节点。
#[derive(Debug, Default)]
pub struct ActionerModel {
    actions: Vec<ActionRef>,
}

impl ActionerModel {
    pub fn new(actions: Vec<ActionRef>) -> Self {
        Self { actions }
    }

    /// 读取 `actions/action*`；没有 `actions` 节点时列表为空。
    pub fn from_setup(setup: &dyn ConfigReader) -> Result<Self, ConfigError> {
        let actions = match setup.node("actions") {
            Some(node) => node
                .children_named("action")
                .map(ActionRef::imports)
                .collect::<Result<_, _>>()?,
            None => Vec::new(),
        };
        Ok(Self::new(actions))
    }

    pub fn actions(&self) -> &[ActionRef] {
        &self.actions
    }
}

impl Feature for ActionerModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::Setup;

    #[test]
    fn actions_are_read_recursively() {
        let setup = Setup::from_ron(
            r#"(
                class: "barracks",
                nodes: [(
                    name: "actions",
                    children: [
                        (name: "action", attributes: {"name": "produce"}, children: [
                            (name: "action", attributes: {"name": "peon"}),
                            (name: "action", attributes: {"name": "grunt", "cancel": "true"}),
                        ]),
                        (name: "action", attributes: {"name": "cancel", "cancel": "true"}),
                    ],
                )],
            )"#,
        )
        .unwrap();

        let actioner = ActionerModel::from_setup(&setup).expect("动作列表应能读取");
        let names: Vec<&str> = actioner.actions().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["produce", "cancel"]);

        let produce = &actioner.actions()[0];
        assert!(!produce.cancel);
        assert_eq!(produce.refs.len(), 2);
        assert!(produce.refs[1].cancel);
        assert!(actioner.actions()[1].cancel);
    }

    #[test]
    fn missing_node_means_no_actions() {
        let actioner = ActionerModel::from_setup(&Setup::new("peon")).unwrap();
        assert!(actioner.actions().is_empty());
    }

    #[test]
    fn action_without_name_is_rejected() {
        let setup = Setup::new("peon").with_node(
            ConfigNode::new("actions").with_child(ConfigNode::new("action").with_attribute("cancel", true)),
        );
        assert!(matches!(
            ActionerModel::from_setup(&setup),
            Err(ConfigError::MissingAttribute { .. })
        ));
    }
}
