use serde::{Deserialize, Serialize};
use tracing::warn;

const TODO_LIST_SOURCE: &str = include_str!("builtin/todo_list.js");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub path: String,
    pub description: String,
}

/// Marks a plugin that also lives in the activity bar as a side panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomView {
    pub id: String,
    pub name: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plugin {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub description: String,
    /// Accent class such as `bg-sky-500`.
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_endpoints: Vec<ApiEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_view: Option<CustomView>,
}

impl Plugin {
    pub fn todo_list() -> Self {
        Self {
            id: "plugin-todo-list".to_string(),
            name: "To-Do List".to_string(),
            icon: "TaskIcon".to_string(),
            description: "A simple to-do list manager that runs in a custom sidebar view."
                .to_string(),
            color: "bg-sky-500".to_string(),
            generated_code: Some(TODO_LIST_SOURCE.to_string()),
            api_endpoints: vec![
                ApiEndpoint {
                    path: "GET /api/tasks".to_string(),
                    description: "Retrieve the list of tasks.".to_string(),
                },
                ApiEndpoint {
                    path: "POST /api/tasks".to_string(),
                    description: "Create a new task.".to_string(),
                },
            ],
            custom_view: Some(CustomView {
                id: "view-todo-list".to_string(),
                name: "To-Do List".to_string(),
                icon: "TaskIcon".to_string(),
            }),
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.generated_code.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("a plugin with id `{0}` already exists")]
    DuplicateId(String),
}

/// Session-lifetime plugin list, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    plugins: Vec<Plugin>,
}

impl PluginCatalog {
    pub fn with_builtins() -> Self {
        Self {
            plugins: vec![Plugin::todo_list()],
        }
    }

    pub fn add(&mut self, plugin: Plugin) -> Result<&Plugin, CatalogError> {
        if self.get(&plugin.id).is_some() {
            warn!(plugin_id = %plugin.id, "refusing to replace an existing plugin");
            return Err(CatalogError::DuplicateId(plugin.id));
        }
        self.plugins.push(plugin);
        Ok(&self.plugins[self.plugins.len() - 1])
    }

    pub fn get(&self, id: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|plugin| plugin.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plugin> {
        self.plugins.iter()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Case-insensitive match on name or description. An empty query matches everything.
    pub fn search<'a>(&'a self, query: &str) -> Vec<&'a Plugin> {
        let needle = query.trim().to_lowercase();
        self.plugins
            .iter()
            .filter(|plugin| {
                needle.is_empty()
                    || plugin.name.to_lowercase().contains(&needle)
                    || plugin.description.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn custom_views(&self) -> impl Iterator<Item = (&Plugin, &CustomView)> {
        self.plugins
            .iter()
            .filter_map(|plugin| plugin.custom_view.as_ref().map(|view| (plugin, view)))
    }

    pub fn by_view(&self, view_id: &str) -> Option<&Plugin> {
        self.custom_views()
            .find(|(_, view)| view.id == view_id)
            .map(|(plugin, _)| plugin)
    }

    pub fn names(&self) -> Vec<String> {
        self.plugins.iter().map(|plugin| plugin.name.clone()).collect()
    }
}
