use serde::Deserialize;
use std::collections::BTreeMap;

/// Read-only copy of the sandbox's mount target, taken after every interaction.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DomNode {
    pub id: u64,
    pub tag: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attrs: DomAttributes,
    #[serde(default)]
    pub style: BTreeMap<String, String>,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub children: Vec<DomNode>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DomAttributes {
    #[serde(rename = "type")]
    pub input_type: Option<String>,
    pub value: Option<String>,
    pub placeholder: Option<String>,
    pub href: Option<String>,
    pub src: Option<String>,
    pub alt: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub selected: bool,
}

impl DomNode {
    pub fn is_text(&self) -> bool {
        self.tag == "#text"
    }

    /// Concatenated text of the subtree, like `Node.textContent`.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(text) = &self.text {
            out.push_str(text);
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }

    pub fn listens(&self, event: &str) -> bool {
        self.events.iter().any(|name| name == event)
    }

    pub fn style(&self, property: &str) -> Option<&str> {
        self.style.get(property).map(String::as_str)
    }

    pub fn input_type(&self) -> &str {
        self.attrs.input_type.as_deref().unwrap_or("text")
    }

    /// Number of element and text nodes below this one.
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    #[cfg(test)]
    pub fn find(&self, predicate: &dyn Fn(&DomNode) -> bool) -> Option<&DomNode> {
        if predicate(self) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(predicate))
    }

    #[cfg(test)]
    pub fn find_all(&self, predicate: &dyn Fn(&DomNode) -> bool) -> Vec<&DomNode> {
        let mut found = Vec::new();
        if predicate(self) {
            found.push(self);
        }
        for child in &self.children {
            found.extend(child.find_all(predicate));
        }
        found
    }
}

/// User interaction routed back into a mounted unit.
#[derive(Debug, Clone, PartialEq)]
pub enum DomEvent {
    Click { target: u64 },
    Input { target: u64, value: String },
    Toggle { target: u64, checked: bool },
    Select { target: u64, value: String },
    /// Enter pressed inside a text field.
    Submit { target: u64 },
}

impl DomEvent {
    pub fn target(&self) -> u64 {
        match self {
            Self::Click { target }
            | Self::Input { target, .. }
            | Self::Toggle { target, .. }
            | Self::Select { target, .. }
            | Self::Submit { target } => *target,
        }
    }

    /// Event type and JSON payload understood by the sandbox bridge.
    pub(crate) fn wire(&self) -> (&'static str, String) {
        match self {
            Self::Click { .. } => ("click", "{}".to_string()),
            Self::Input { value, .. } => ("input", serde_json::json!({ "value": value }).to_string()),
            Self::Toggle { checked, .. } => {
                ("click", serde_json::json!({ "checked": checked }).to_string())
            }
            Self::Select { value, .. } => ("change", serde_json::json!({ "value": value }).to_string()),
            Self::Submit { .. } => ("submit", "{}".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> DomNode {
        serde_json::from_value(json!({
            "id": 1,
            "tag": "div",
            "attrs": { "checked": false, "disabled": false, "selected": false },
            "style": { "color": "#fff" },
            "events": [],
            "children": [
                { "id": 2, "tag": "#text", "text": "hello " },
                {
                    "id": 3,
                    "tag": "input",
                    "attrs": { "type": "checkbox", "checked": true, "value": "" },
                    "events": ["change"],
                    "children": []
                },
                { "id": 4, "tag": "span", "children": [{ "id": 5, "tag": "#text", "text": "world" }] }
            ]
        }))
        .expect("snapshot json")
    }

    #[test]
    fn snapshot_deserializes_with_defaults() {
        let root = sample();
        assert_eq!(root.text_content(), "hello world");
        assert_eq!(root.descendant_count(), 4);
        assert_eq!(root.style("color"), Some("#fff"));

        let checkbox = root.find(&|node| node.tag == "input").expect("input node");
        assert_eq!(checkbox.input_type(), "checkbox");
        assert!(checkbox.attrs.checked);
        assert!(checkbox.listens("change"));
    }

    #[test]
    fn find_all_walks_the_whole_tree() {
        let root = sample();
        let texts = root.find_all(&|node| node.is_text());
        assert_eq!(texts.len(), 2);
        assert!(root.find(&|node| node.id == 99).is_none());
    }

    #[test]
    fn toggle_travels_as_click_with_checked_payload() {
        let (kind, payload) = DomEvent::Toggle { target: 3, checked: true }.wire();
        assert_eq!(kind, "click");
        assert_eq!(payload, r#"{"checked":true}"#);
        assert_eq!(DomEvent::Submit { target: 7 }.target(), 7);
    }
}
