//! Static model and mode registries.
//!
//! Registry order matters: substitution rules always pick the first compatible
//! entry, and versus slots are dispatched in this order.

use crate::error::VibecheckCoreError;
use serde::Serialize;
use vibecheck_rs_protocol::{ModeId, ModelId};

/// Width of generated sketches and images, in pixels.
pub const OUTPUT_WIDTH: u32 = 400;
/// Height of generated sketches and images, in pixels.
pub const OUTPUT_HEIGHT: u32 = 300;

/// A generation model and its capabilities.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModelInfo {
    /// Registry key.
    pub id: ModelId,
    /// Display name.
    pub name: String,
    /// Model family version.
    pub version: String,
    /// Model string sent to the backend.
    pub model_string: String,
    /// Compact display name.
    pub short_name: String,
    /// Whether thinking can be toggled for this model.
    pub thinking_capable: bool,
    /// Whether thinking is enabled for this entry.
    pub thinking: bool,
    /// Whether the model produces images instead of text.
    pub image_output: bool,
}

impl ModelInfo {
    /// Whether this model can serve a mode with the given image-output requirement.
    pub fn serves(&self, image_output: bool) -> bool {
        self.image_output == image_output
    }
}

/// A generation mode (code or image domain).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModeInfo {
    /// Registry key.
    pub id: ModeId,
    /// Display name.
    pub name: String,
    /// Display emoji.
    pub emoji: String,
    /// Syntax highlighting hint for outputs.
    pub syntax: String,
    /// System instruction sent with every request in this mode.
    pub system_instruction: String,
    /// Whether outputs are images; image modes force batch mode.
    pub image_output: bool,
}

/// Ordered lookup tables for models and modes.
#[derive(Debug, Clone)]
pub struct Registry {
    models: Vec<ModelInfo>,
    modes: Vec<ModeInfo>,
}

impl Registry {
    /// Build a registry; both tables must be non-empty.
    pub fn new(models: Vec<ModelInfo>, modes: Vec<ModeInfo>) -> Result<Self, VibecheckCoreError> {
        if models.is_empty() {
            return Err(VibecheckCoreError::EmptyRegistry("models"));
        }
        if modes.is_empty() {
            return Err(VibecheckCoreError::EmptyRegistry("modes"));
        }
        Ok(Self { models, modes })
    }

    /// All models in registry order.
    pub fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    /// All modes in registry order.
    pub fn modes(&self) -> &[ModeInfo] {
        &self.modes
    }

    /// Look up a model by id.
    pub fn model(&self, id: &str) -> Option<&ModelInfo> {
        self.models.iter().find(|model| model.id == id)
    }

    /// Look up a mode by id.
    pub fn mode(&self, id: &str) -> Option<&ModeInfo> {
        self.modes.iter().find(|mode| mode.id == id)
    }

    /// Look up a model by id or fail with `UnknownModel`.
    pub fn require_model(&self, id: &str) -> Result<&ModelInfo, VibecheckCoreError> {
        self.model(id)
            .ok_or_else(|| VibecheckCoreError::UnknownModel(id.to_string()))
    }

    /// Look up a mode by id or fail with `UnknownMode`.
    pub fn require_mode(&self, id: &str) -> Result<&ModeInfo, VibecheckCoreError> {
        self.mode(id)
            .ok_or_else(|| VibecheckCoreError::UnknownMode(id.to_string()))
    }

    /// The first model in registry order.
    pub fn first_model(&self) -> &ModelInfo {
        &self.models[0]
    }

    /// The first mode in registry order.
    pub fn first_mode(&self) -> &ModeInfo {
        &self.modes[0]
    }

    /// Whether a mode requires image output. Unknown modes are treated as text.
    pub fn mode_requires_image(&self, id: &str) -> bool {
        self.mode(id).is_some_and(|mode| mode.image_output)
    }

    /// Whether a model can serve the given image-output requirement. Unknown models cannot.
    pub fn is_compatible(&self, model_id: &str, image_output: bool) -> bool {
        self.model(model_id)
            .is_some_and(|model| model.serves(image_output))
    }

    /// First model in registry order that serves the image-output requirement.
    pub fn first_compatible_model(&self, image_output: bool) -> Option<&ModelInfo> {
        self.models.iter().find(|model| model.serves(image_output))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            models: builtin_models(),
            modes: builtin_modes(),
        }
    }
}

fn model(
    id: &str,
    name: &str,
    model_string: &str,
    short_name: &str,
    thinking_capable: bool,
    thinking: bool,
    image_output: bool,
) -> ModelInfo {
    ModelInfo {
        id: id.to_string(),
        name: name.to_string(),
        version: "2.5".to_string(),
        model_string: model_string.to_string(),
        short_name: short_name.to_string(),
        thinking_capable,
        thinking,
        image_output,
    }
}

/// Built-in Gemini model table.
pub fn builtin_models() -> Vec<ModelInfo> {
    vec![
        model(
            "flash",
            "Flash (thinking off)",
            "gemini-2.5-flash",
            "Flash",
            true,
            false,
            false,
        ),
        model(
            "flash-thinking",
            "Flash",
            "gemini-2.5-flash",
            "Flash",
            true,
            true,
            false,
        ),
        model(
            "image-editor",
            "Image Editor",
            "gemini-2.5-flash-image-preview",
            "Image Editor",
            false,
            false,
            true,
        ),
    ]
}

fn mode(
    id: &str,
    name: &str,
    emoji: &str,
    syntax: &str,
    system_instruction: String,
    image_output: bool,
) -> ModeInfo {
    ModeInfo {
        id: id.to_string(),
        name: name.to_string(),
        emoji: emoji.to_string(),
        syntax: syntax.to_string(),
        system_instruction,
        image_output,
    }
}

/// Built-in mode table with system instructions.
pub fn builtin_modes() -> Vec<ModeInfo> {
    let (w, h) = (OUTPUT_WIDTH, OUTPUT_HEIGHT);
    vec![
        mode(
            "p5",
            "P5.js",
            "🎨",
            "javascript",
            format!(
                "You are an expert P5.js developer. When given a prompt, you will use your \
                 creativity and coding skills to create a {w}x{h} P5.js sketch that perfectly \
                 satisfies the prompt. Be creative and add animation or interactivity if \
                 appropriate. Do not import any external assets, they won't work. Return ONLY \
                 the P5.js code, nothing else, no commentary."
            ),
            false,
        ),
        mode(
            "svg",
            "SVG",
            "📐",
            "xml",
            format!(
                "You are an expert at turning image prompts into SVG code. When given a prompt, \
                 use your creativity to code a {w}x{h} SVG rendering of it. Always add \
                 viewBox=\"0 0 {w} {h}\" to the root svg tag. Do not import external assets, \
                 they won't work. Return ONLY the SVG code, nothing else, no commentary."
            ),
            false,
        ),
        mode(
            "html",
            "HTML/JS",
            "📄",
            "html",
            "You are an expert web developer. When given a prompt, you will use your creativity \
             and coding skills to create a minimal web app that perfectly satisfies the prompt. \
             Try to use only vanilla JavaScript, HTML, and CSS. Try to design the layout so it \
             looks good in a 4:3 aspect ratio. Write a full HTML page with the styles and \
             scripts inlined. The app will run inside a sandboxed iframe so do not use any \
             secure APIs like localStorage and don't make any network calls. Do not ever import \
             assets like images or videos, they won't work. Try using emojis for graphics. \
             Return ONLY the HTML page, nothing else, no commentary."
                .to_string(),
            false,
        ),
        mode(
            "three",
            "Three.js",
            "3️⃣",
            "html",
            format!(
                "You are an expert Three.js developer. When given a prompt, you will use your \
                 creativity and coding skills to create a {w}x{h} Three.js scene that perfectly \
                 satisfies the prompt. Always return a full HTML document with the Three.js \
                 library included. Import the library and any other necessary libraries via the \
                 esm.run CDN (e.g. https://esm.run/three). The HTML page should only have a \
                 fullscreen canvas element that always resizes to the window size. Remember to \
                 set the renderer.setPixelRatio to 2. Always add orbit controls to the scene so \
                 the user can rotate the camera. Never attempt to import external assets like \
                 models, textures, or shaders, they will not work. Return ONLY the HTML code \
                 with embedded JS, nothing else, no commentary."
            ),
            false,
        ),
        mode(
            "image",
            "Images",
            "🖼️",
            "image",
            format!(
                "You are an expert image editor. Given an input image and a prompt, you will use \
                 your creativity to edit the image to perfectly satisfy the prompt. The output \
                 must be a {w}x{h} image."
            ),
            true,
        ),
    ]
}
