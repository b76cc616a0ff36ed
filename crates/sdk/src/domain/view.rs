use serde::{Deserialize, Serialize};

use crate::ids::ViewId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub id: ViewId,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ViewKind,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewKind {
    #[default]
    Grid,
    Kanban,
    Calendar,
    Gallery,
    Form,
}

impl View {
    pub fn new(id: impl Into<ViewId>, name: impl Into<String>, kind: ViewKind) -> Self {
        View {
            id: id.into(),
            name: name.into(),
            kind,
        }
    }

    /// The grid view every table gets when none is supplied.
    pub fn default_grid() -> Self {
        View::new(ViewId::generate(), "Grid view", ViewKind::Grid)
    }
}
