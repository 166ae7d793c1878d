//! Scene facts: walkable geometry, furniture and the user's position
//!
//! A scene file stands in for a live scene-understanding provider:
//!
//! ```json
//! {
//!   "meshes": [{ "vertices": [[0, 0, 0], [4, 0, 0], [4, 0, 4]], "triangles": [[0, 2, 1]] }],
//!   "furniture": [{ "label": "table", "position": { "x": 1.0, "y": 0.0, "z": 2.0 } }],
//!   "user_position": { "x": 0.0, "y": 1.6, "z": 0.0 }
//! }
//! ```

use glam::Vec3;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tomo_core::{Error, Result};
use tomo_nav::WalkableGeometry;

/// Position as it appears on the wire
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for Position {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Position> for Vec3 {
    fn from(p: Position) -> Self {
        Vec3::new(p.x, p.y, p.z)
    }
}

/// A labelled piece of furniture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Furniture {
    pub label: String,
    pub position: Position,
}

/// Scene description loaded from disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneFile {
    #[serde(default)]
    pub meshes: Vec<WalkableGeometry>,
    #[serde(default)]
    pub furniture: Vec<Furniture>,
    #[serde(default)]
    pub user_position: Option<Position>,
}

impl SceneFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read scene {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// All meshes merged into one geometry
    pub fn geometry(&self) -> WalkableGeometry {
        WalkableGeometry::merge(&self.meshes)
    }
}

#[derive(Debug)]
struct SceneState {
    furniture: Vec<Furniture>,
    user_position: Position,
}

/// Shared, updatable scene facts
#[derive(Debug, Clone)]
pub struct SceneFacts {
    state: Arc<RwLock<SceneState>>,
}

impl Default for SceneFacts {
    fn default() -> Self {
        Self::new(Vec::new(), Position { x: 0.0, y: 1.6, z: 0.0 })
    }
}

impl SceneFacts {
    pub fn new(furniture: Vec<Furniture>, user_position: Position) -> Self {
        Self {
            state: Arc::new(RwLock::new(SceneState {
                furniture,
                user_position,
            })),
        }
    }

    pub fn from_scene(scene: &SceneFile) -> Self {
        let facts = Self::default();
        facts.set_furniture(scene.furniture.clone());
        if let Some(position) = scene.user_position {
            facts.set_user_position(position);
        }
        facts
    }

    pub fn furniture(&self) -> Vec<Furniture> {
        self.state.read().furniture.clone()
    }

    pub fn set_furniture(&self, furniture: Vec<Furniture>) {
        self.state.write().furniture = furniture;
    }

    pub fn user_position(&self) -> Position {
        self.state.read().user_position
    }

    pub fn set_user_position(&self, position: Position) {
        self.state.write().user_position = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_scene_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "meshes": [
                    {{"vertices": [[0, 0, 0], [2, 0, 0], [2, 0, 2], [0, 0, 2]], "triangles": [[0, 2, 1], [0, 3, 2]]}},
                    {{"vertices": [[2, 0, 0], [3, 0, 0], [3, 0, 2]], "triangles": [[0, 2, 1]]}}
                ],
                "furniture": [{{"label": "sofa", "position": {{"x": 1.0, "y": 0.0, "z": 1.5}}}}]
            }}"#
        )
        .unwrap();

        let scene = SceneFile::load(file.path()).unwrap();
        assert_eq!(scene.geometry().triangle_count(), 3);

        let facts = SceneFacts::from_scene(&scene);
        assert_eq!(facts.furniture()[0].label, "sofa");
        assert_eq!(facts.user_position(), Position { x: 0.0, y: 1.6, z: 0.0 });
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let result = SceneFile::load(Path::new("/nonexistent/scene.json"));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
