//! Engine operation kinds and their output slots
//!
//! Each operation kind names its engine `class_type` and the enum of output
//! slots it exposes. Slot indices are fixed by the engine; wiring code
//! refers to them by name only.

/// A named output position of an operation kind
pub trait OutputSlot: Copy {
    fn index(self) -> u32;
}

/// An engine operation kind
pub trait NodeKind {
    /// Engine operation type tag
    const CLASS_TYPE: &'static str;
    /// Output slots this kind exposes
    type Slot: OutputSlot;
}

/// Slot type for sink operations that expose no outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOutputs {}

impl OutputSlot for NoOutputs {
    fn index(self) -> u32 {
        match self {}
    }
}

macro_rules! output_slots {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $index:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant = $index),+
        }

        impl OutputSlot for $name {
            fn index(self) -> u32 {
                self as u32
            }
        }
    };
}

macro_rules! node_kinds {
    ($($(#[$meta:meta])* $name:ident => $class:literal, $slot:ty;)+) => {
        $(
            $(#[$meta])*
            #[derive(Debug)]
            pub enum $name {}

            impl NodeKind for $name {
                const CLASS_TYPE: &'static str = $class;
                type Slot = $slot;
            }
        )+
    };
}

output_slots!(
    /// Outputs of the base checkpoint loader
    CheckpointSlot { Model = 0, Clip = 1, Vae = 2 }
);
output_slots!(ModelSlot { Model = 0 });
output_slots!(ClipSlot { Clip = 0 });
output_slots!(AudioVaeSlot { AudioVae = 0 });
output_slots!(LoadImageSlot { Image = 0, Mask = 1 });
output_slots!(ConditioningSlot { Conditioning = 0 });
output_slots!(
    /// Positive and negative conditioning pair
    ConditioningPairSlot { Positive = 0, Negative = 1 }
);
output_slots!(LatentSlot { Latent = 0 });
output_slots!(EmptyLatentVideoSlot { Latent = 0 });
output_slots!(
    /// Outputs of the image-to-video fusion node. The latent sits after the
    /// conditioning pair.
    ImageToVideoSlot { Positive = 0, Negative = 1, Latent = 2 }
);
output_slots!(SeparateAvSlot { Video = 0, Audio = 1 });
output_slots!(ImageSlot { Image = 0 });
output_slots!(AudioSlot { Audio = 0 });
output_slots!(VideoSlot { Video = 0 });

node_kinds! {
    CheckpointLoader => "CheckpointLoaderSimple", CheckpointSlot;
    /// Compile wrapper around the diffusion model
    CompileModel => "TorchCompileModel", ModelSlot;
    TextEncoderLoader => "LTXVGemmaCLIPModelLoader", ClipSlot;
    AudioVaeLoader => "LTXVAudioVAELoader", AudioVaeSlot;
    LoadImage => "LoadImage", LoadImageSlot;
    EmptyLatentAudio => "LTXVEmptyLatentAudio", LatentSlot;
    TextEncode => "CLIPTextEncode", ConditioningSlot;
    EmptyLatentVideo => "EmptyLTXVLatentVideo", EmptyLatentVideoSlot;
    ImageToVideo => "LTXVImgToVideo", ImageToVideoSlot;
    /// Frame-rate conditioning
    FrameRateConditioning => "LTXVConditioning", ConditioningPairSlot;
    ConcatAvLatent => "LTXVConcatAVLatent", LatentSlot;
    Sampler => "KSampler", LatentSlot;
    SeparateAvLatent => "LTXVSeparateAVLatent", SeparateAvSlot;
    VaeDecode => "VAEDecode", ImageSlot;
    AdjustContrast => "AdjustContrast", ImageSlot;
    ImageScale => "ImageScale", ImageSlot;
    AudioVaeDecode => "LTXVAudioVAEDecode", AudioSlot;
    /// Muxes frames and audio into a video
    CreateVideo => "CreateVideo", VideoSlot;
    SaveVideo => "SaveVideo", NoOutputs;
}
