// src/services/dimensions.rs
//
// Static (aspect ratio, quality tier) -> pixel dimension tables, one per
// provider. Entries are hand-tuned model buckets, not ratio arithmetic:
// Gemini buckets are multiples of 8 around ~1MP, ModelScope entries are
// multiples of 64. Dimensions are metadata only; they are never derived at
// runtime from the ratio numbers.
use crate::errors::EaselError;
use crate::models::{AspectRatio, ProviderKind, QualityTier, ResolvedDimensions};

/// Looks up the pixel dimensions for a (ratio, tier) pair in the given
/// provider's table. Absent pairs fail with `UnsupportedDimension`; callers
/// decide whether to propagate (the relay does) or fall back explicitly
/// (`resolve_or_default`).
pub fn resolve(
    provider: ProviderKind,
    ratio: AspectRatio,
    tier: QualityTier,
) -> Result<ResolvedDimensions, EaselError> {
    let dims = match provider {
        ProviderKind::Gemini => gemini(ratio, tier),
        ProviderKind::ModelScope => modelscope(ratio, tier),
    };
    dims.ok_or_else(|| EaselError::UnsupportedDimension {
        ratio: ratio.as_str().to_string(),
        tier: tier.as_str().to_string(),
    })
}

/// Canvas-sizing fallback: unsupported pairs clamp to the square lowest
/// tier instead of failing. Only for presentation call sites that must
/// always produce a size; request validation uses `resolve`.
pub fn resolve_or_default(
    provider: ProviderKind,
    ratio: AspectRatio,
    tier: QualityTier,
) -> ResolvedDimensions {
    resolve(provider, ratio, tier).unwrap_or(ResolvedDimensions {
        width: 1024,
        height: 1024,
    })
}

/// Gemini supports all ten ratios. The 2K and 4K tiers are the 1K bucket
/// doubled and quadrupled, which keeps every entry a multiple of 8.
fn gemini(ratio: AspectRatio, tier: QualityTier) -> Option<ResolvedDimensions> {
    let (width, height) = match ratio {
        AspectRatio::Square => (1024, 1024),
        AspectRatio::Portrait2x3 => (832, 1216),
        AspectRatio::Landscape3x2 => (1216, 832),
        AspectRatio::Portrait3x4 => (896, 1152),
        AspectRatio::Landscape4x3 => (1152, 896),
        AspectRatio::Portrait4x5 => (896, 1120),
        AspectRatio::Landscape5x4 => (1120, 896),
        AspectRatio::Portrait9x16 => (768, 1344),
        AspectRatio::Wide16x9 => (1344, 768),
        AspectRatio::UltraWide21x9 => (1536, 640),
    };
    let scale = match tier {
        QualityTier::OneK => 1,
        QualityTier::TwoK => 2,
        QualityTier::FourK => 4,
    };
    Some(ResolvedDimensions {
        width: width * scale,
        height: height * scale,
    })
}

/// ModelScope supports five ratios; every entry is an exact ratio in
/// multiples of 64, which its diffusion backends require.
fn modelscope(ratio: AspectRatio, tier: QualityTier) -> Option<ResolvedDimensions> {
    let (width, height) = match (ratio, tier) {
        (AspectRatio::Square, QualityTier::OneK) => (1024, 1024),
        (AspectRatio::Square, QualityTier::TwoK) => (2048, 2048),
        (AspectRatio::Square, QualityTier::FourK) => (4096, 4096),

        (AspectRatio::Landscape4x3, QualityTier::OneK) => (1024, 768),
        (AspectRatio::Landscape4x3, QualityTier::TwoK) => (2048, 1536),
        (AspectRatio::Landscape4x3, QualityTier::FourK) => (4096, 3072),

        (AspectRatio::Portrait3x4, QualityTier::OneK) => (768, 1024),
        (AspectRatio::Portrait3x4, QualityTier::TwoK) => (1536, 2048),
        (AspectRatio::Portrait3x4, QualityTier::FourK) => (3072, 4096),

        (AspectRatio::Wide16x9, QualityTier::OneK) => (1024, 576),
        (AspectRatio::Wide16x9, QualityTier::TwoK) => (2048, 1152),
        (AspectRatio::Wide16x9, QualityTier::FourK) => (4096, 2304),

        (AspectRatio::Portrait9x16, QualityTier::OneK) => (576, 1024),
        (AspectRatio::Portrait9x16, QualityTier::TwoK) => (1152, 2048),
        (AspectRatio::Portrait9x16, QualityTier::FourK) => (2304, 4096),

        _ => return None,
    };
    Some(ResolvedDimensions { width, height })
}
