//! AR scene commands
//!
//! The scene graph belongs to the host AR view and must only be touched from
//! the UI side. The pipeline therefore describes scene changes as
//! [`SceneCommand`]s and the presentation layer applies them.

/// Font size of placed text nodes (points, before scaling)
pub const TEXT_NODE_FONT_SIZE: f32 = 10.0;
/// Extrusion depth of placed text geometry
pub const TEXT_NODE_EXTRUSION: f32 = 0.5;
/// Uniform scale applied to placed text nodes
pub const TEXT_NODE_SCALE: f32 = 0.01;

/// A 3D text label anchored in the scene
#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub text: String,
    /// Anchor position in scene coordinates (meters)
    pub position: [f32; 3],
    pub font_size: f32,
    pub extrusion_depth: f32,
    pub scale: f32,
}

impl TextNode {
    pub fn new(text: impl Into<String>, position: [f32; 3]) -> Self {
        Self {
            text: text.into(),
            position,
            font_size: TEXT_NODE_FONT_SIZE,
            extrusion_depth: TEXT_NODE_EXTRUSION,
            scale: TEXT_NODE_SCALE,
        }
    }
}

/// Scene mutation requested by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum SceneCommand {
    /// Remove every anchor and node previously placed
    ClearAnchors,
    /// Anchor a text node at its position
    PlaceTextNode(TextNode),
}

/// Host scene root the presentation layer mutates
pub trait SceneRoot {
    fn remove_all_anchors(&mut self);
    fn add_text_node(&mut self, node: TextNode);
}

impl SceneCommand {
    pub fn apply(self, scene: &mut dyn SceneRoot) {
        match self {
            SceneCommand::ClearAnchors => scene.remove_all_anchors(),
            SceneCommand::PlaceTextNode(node) => scene.add_text_node(node),
        }
    }
}

/// Scene root that only records placed nodes
#[derive(Debug, Default)]
pub struct RecordingScene {
    nodes: Vec<TextNode>,
}

impl RecordingScene {
    pub fn nodes(&self) -> &[TextNode] {
        &self.nodes
    }
}

impl SceneRoot for RecordingScene {
    fn remove_all_anchors(&mut self) {
        self.nodes.clear();
    }

    fn add_text_node(&mut self, node: TextNode) {
        self.nodes.push(node);
    }
}
