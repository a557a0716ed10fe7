//! Builders for the opaque node-graph workflow specs submitted to the
//! generation engine.
//!
//! A spec is a mapping `node_id -> {class_type, inputs}`; node wiring uses
//! `[node_id, output_index]` pairs. The engine treats the graph as opaque,
//! so the shapes here only need to match what the deployed node set expects.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::adapters::ArtStyle;

pub const DEFAULT_CHECKPOINT: &str = "CartoonXL.safetensors";
pub const DEFAULT_NEGATIVE: &str = "blurry, low quality, text, watermark, signature, \
deformed, ugly, bad anatomy";

/// One submittable node graph.
#[derive(Clone, Debug, Serialize)]
#[serde(transparent)]
pub struct WorkflowSpec {
    pub nodes: Map<String, Value>,
}

impl WorkflowSpec {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Object(nodes) => Self { nodes },
            _ => Self { nodes: Map::new() },
        }
    }
}

/// Adapter strength used when transferring a reference style, per style.
pub fn style_transfer_weight(style: ArtStyle) -> f64 {
    match style {
        ArtStyle::Cartoon => 0.75,
        ArtStyle::Anime => 0.85,
        ArtStyle::Realistic => 1.00,
        ArtStyle::ThreeD => 0.90,
        // Remaining styles follow the cartoon preset.
        ArtStyle::Illustration | ArtStyle::Pixel => 0.75,
    }
}

fn auto_seed() -> u32 {
    // Derived from wall-clock nanos; the engine only needs variety, not
    // cryptographic randomness.
    let now = chrono::Utc::now();
    (now.timestamp() as u32).wrapping_mul(2_654_435_761) ^ now.timestamp_subsec_nanos()
}

fn resolve_seed(seed: Option<u32>) -> u32 {
    seed.unwrap_or_else(auto_seed)
}

/// Plain text-to-image generation (the first reference image of a run).
pub fn text_to_image(prompt: &str, width: u32, height: u32, seed: Option<u32>) -> WorkflowSpec {
    WorkflowSpec::from_value(json!({
        "3": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": DEFAULT_CHECKPOINT}},
        "4": {"class_type": "CLIPTextEncode", "inputs": {"text": prompt, "clip": ["3", 1]}},
        "5": {"class_type": "CLIPTextEncode", "inputs": {"text": DEFAULT_NEGATIVE, "clip": ["3", 1]}},
        "6": {"class_type": "EmptyLatentImage", "inputs": {"width": width, "height": height, "batch_size": 1}},
        "7": {"class_type": "KSampler", "inputs": {
            "seed": resolve_seed(seed), "steps": 25, "cfg": 7.0,
            "sampler_name": "euler", "scheduler": "normal", "denoise": 1.0,
            "model": ["3", 0], "positive": ["4", 0], "negative": ["5", 0], "latent_image": ["6", 0]
        }},
        "8": {"class_type": "VAEDecode", "inputs": {"samples": ["7", 0], "vae": ["3", 2]}},
        "9": {"class_type": "SaveImage", "inputs": {"filename_prefix": "studio_t2i", "images": ["8", 0]}}
    }))
}

/// Adapter style transfer keyed on a reference image already uploaded to the
/// engine's input directory, for consistent character identity.
pub fn style_transfer(
    prompt: &str,
    reference_image_name: &str,
    weight: f64,
    seed: Option<u32>,
) -> WorkflowSpec {
    WorkflowSpec::from_value(json!({
        "1": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": DEFAULT_CHECKPOINT}},
        "2": {"class_type": "LoadImage", "inputs": {"image": reference_image_name}},
        "3": {"class_type": "IPAdapterModelLoader", "inputs": {"ipadapter_file": "ip-adapter-plus_sdxl_vit-h.safetensors"}},
        "4": {"class_type": "CLIPVisionLoader", "inputs": {"clip_name": "CLIP-ViT-H-14-laion2B-s32B-b79K.safetensors"}},
        "5": {"class_type": "IPAdapterAdvanced", "inputs": {
            "weight": weight, "weight_type": "style transfer", "combine_embeds": "concat",
            "start_at": 0.0, "end_at": 0.9, "embeds_scaling": "V only",
            "model": ["1", 0], "ipadapter": ["3", 0], "image": ["2", 0], "clip_vision": ["4", 0]
        }},
        "6": {"class_type": "CLIPTextEncode", "inputs": {"text": prompt, "clip": ["1", 1]}},
        "7": {"class_type": "CLIPTextEncode", "inputs": {"text": DEFAULT_NEGATIVE, "clip": ["1", 1]}},
        "8": {"class_type": "EmptyLatentImage", "inputs": {"width": 1024, "height": 1024, "batch_size": 1}},
        "9": {"class_type": "KSampler", "inputs": {
            "seed": resolve_seed(seed), "steps": 30, "cfg": 7.0,
            "sampler_name": "euler", "scheduler": "normal", "denoise": 1.0,
            "model": ["5", 0], "positive": ["6", 0], "negative": ["7", 0], "latent_image": ["8", 0]
        }},
        "10": {"class_type": "VAEDecode", "inputs": {"samples": ["9", 0], "vae": ["1", 2]}},
        "11": {"class_type": "SaveImage", "inputs": {"filename_prefix": "studio_styled", "images": ["10", 0]}}
    }))
}

/// Instruction-driven image edit over a base64 input, with an edit-type
/// specific denoise strength in [0.60, 0.75].
pub fn image_edit(
    input_image_b64: &str,
    instruction: &str,
    denoise: f64,
    seed: Option<u32>,
) -> WorkflowSpec {
    WorkflowSpec::from_value(json!({
        "1": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": DEFAULT_CHECKPOINT}},
        "2": {"class_type": "ETN_LoadImageBase64", "inputs": {"image": input_image_b64}},
        "3": {"class_type": "VAEEncode", "inputs": {"pixels": ["2", 0], "vae": ["1", 2]}},
        "4": {"class_type": "CLIPTextEncode", "inputs": {"text": instruction, "clip": ["1", 1]}},
        "5": {"class_type": "CLIPTextEncode", "inputs": {"text": DEFAULT_NEGATIVE, "clip": ["1", 1]}},
        "6": {"class_type": "KSampler", "inputs": {
            "seed": resolve_seed(seed), "steps": 25, "cfg": 7.0,
            "sampler_name": "euler", "scheduler": "normal", "denoise": denoise,
            "model": ["1", 0], "positive": ["4", 0], "negative": ["5", 0], "latent_image": ["3", 0]
        }},
        "7": {"class_type": "VAEDecode", "inputs": {"samples": ["6", 0], "vae": ["1", 2]}},
        "8": {"class_type": "SaveImage", "inputs": {"filename_prefix": "studio_edit", "images": ["7", 0]}}
    }))
}

/// Background removal to a transparent PNG.
pub fn remove_background(input_image_b64: &str) -> WorkflowSpec {
    WorkflowSpec::from_value(json!({
        "1": {"class_type": "ETN_LoadImageBase64", "inputs": {"image": input_image_b64}},
        "2": {"class_type": "ImageRemoveBackground+", "inputs": {"image": ["1", 0]}},
        "3": {"class_type": "SaveImage", "inputs": {"filename_prefix": "studio_nobg", "images": ["2", 0]}}
    }))
}

/// Image-to-video: a short clip animating one scene image already uploaded
/// to the engine's input directory.
pub fn image_to_video(
    image_name: &str,
    prompt: &str,
    num_frames: u32,
    seed: Option<u32>,
) -> WorkflowSpec {
    WorkflowSpec::from_value(json!({
        "1": {"class_type": "LoadImage", "inputs": {"image": image_name}},
        "2": {"class_type": "WanVideoModelLoader", "inputs": {"model": "wan2.1_i2v_480p_14B_fp8.safetensors"}},
        "3": {"class_type": "WanVideoTextEncode", "inputs": {"positive_prompt": prompt, "negative_prompt": DEFAULT_NEGATIVE}},
        "4": {"class_type": "WanVideoImageToVideo", "inputs": {
            "width": 832, "height": 480, "num_frames": num_frames,
            "seed": resolve_seed(seed), "steps": 30, "cfg": 5.0,
            "model": ["2", 0], "conditioning": ["3", 0], "start_image": ["1", 0]
        }},
        "5": {"class_type": "VHS_VideoCombine", "inputs": {
            "frame_rate": 16, "format": "video/h264-mp4",
            "filename_prefix": "studio_i2v", "images": ["4", 0]
        }}
    }))
}

/// Image-to-video variant carrying the start image inline as base64, for
/// deployments without a mounted engine input directory.
pub fn image_to_video_inline(
    image_b64: &str,
    prompt: &str,
    num_frames: u32,
    seed: Option<u32>,
) -> WorkflowSpec {
    let mut spec = image_to_video("placeholder.png", prompt, num_frames, seed);
    spec.nodes.insert(
        "1".into(),
        json!({"class_type": "ETN_LoadImageBase64", "inputs": {"image": image_b64}}),
    );
    spec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_to_image_builds_a_connected_graph() {
        let spec = text_to_image("a cat", 1024, 1024, Some(7));
        assert_eq!(spec.nodes["7"]["inputs"]["seed"], 7);
        assert_eq!(spec.nodes["7"]["class_type"], "KSampler");
        assert_eq!(spec.nodes["4"]["inputs"]["text"], "a cat");
        // The sampler reads positive conditioning from node 4.
        assert_eq!(spec.nodes["7"]["inputs"]["positive"][0], "4");
    }

    #[test]
    fn style_transfer_weights_follow_the_preset_table() {
        assert_eq!(style_transfer_weight(ArtStyle::Cartoon), 0.75);
        assert_eq!(style_transfer_weight(ArtStyle::Anime), 0.85);
        assert_eq!(style_transfer_weight(ArtStyle::Realistic), 1.00);
        assert_eq!(style_transfer_weight(ArtStyle::ThreeD), 0.90);
    }

    #[test]
    fn image_edit_carries_denoise() {
        let spec = image_edit("QUJD", "remove glasses", 0.65, Some(1));
        assert_eq!(spec.nodes["6"]["inputs"]["denoise"], 0.65);
        assert_eq!(spec.nodes["4"]["inputs"]["text"], "remove glasses");
    }

    #[test]
    fn auto_seed_used_when_unset() {
        let spec = text_to_image("x", 512, 512, None);
        assert!(spec.nodes["7"]["inputs"]["seed"].as_u64().is_some());
    }
}
