//! Shader-variant selection and blend-factor tables.
//!
//! The catalog holds 19 variants: index 0 generates masks, and indices
//! 1..=18 cover every (blend mode, mask state, alpha mode) combination for
//! regular draws. Only seven distinct GL programs back them; the Additive
//! and Multiplicative ranges reuse the Normal programs and differ only in
//! the blend factors applied at draw time.
//!
//! Everything here is pure index math, usable without a GL context.

use serde::Serialize;

use crate::model::BlendMode;

/// Number of entries in the shader catalog.
pub const SHADER_COUNT: usize = 19;

/// Number of distinct GL programs backing the catalog.
pub const PROGRAM_COUNT: usize = 7;

/// Catalog index of the mask-generation variant.
pub const MASK_VARIANT: usize = 0;

/// Variants per blend mode (3 mask states x 2 alpha modes).
const VARIANTS_PER_BLEND: usize = 6;

/// How a regular draw samples its clipping mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MaskState {
    Unmasked,
    Masked,
    MaskedInverted,
}

impl MaskState {
    pub fn new(masked: bool, inverted: bool) -> Self {
        match (masked, inverted) {
            (false, _) => MaskState::Unmasked,
            (true, false) => MaskState::Masked,
            (true, true) => MaskState::MaskedInverted,
        }
    }

    fn offset(self) -> usize {
        match self {
            MaskState::Unmasked => 0,
            MaskState::Masked => 1,
            MaskState::MaskedInverted => 2,
        }
    }
}

/// First catalog index of each blend mode's range.
pub fn blend_base(mode: BlendMode) -> usize {
    match mode {
        BlendMode::Normal => 1,
        BlendMode::Additive => 7,
        BlendMode::Multiplicative => 13,
    }
}

/// Catalog index of the draw variant for the given combination.
pub fn select_for_draw(mode: BlendMode, mask: MaskState, premultiplied: bool) -> usize {
    let alpha_offset = if premultiplied { 3 } else { 0 };
    blend_base(mode) + mask.offset() + alpha_offset
}

/// The distinct program (in `0..PROGRAM_COUNT`) that backs a catalog index.
pub fn program_slot(variant: usize) -> usize {
    if variant == MASK_VARIANT {
        MASK_VARIANT
    } else {
        (variant - 1) % VARIANTS_PER_BLEND + 1
    }
}

/// The program kinds compiled into the catalog, in program-slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProgramKind {
    SetupMask,
    Plain,
    Masked,
    MaskedInverted,
    PlainPremultiplied,
    MaskedPremultiplied,
    MaskedInvertedPremultiplied,
}

impl ProgramKind {
    pub const ALL: [ProgramKind; PROGRAM_COUNT] = [
        ProgramKind::SetupMask,
        ProgramKind::Plain,
        ProgramKind::Masked,
        ProgramKind::MaskedInverted,
        ProgramKind::PlainPremultiplied,
        ProgramKind::MaskedPremultiplied,
        ProgramKind::MaskedInvertedPremultiplied,
    ];

    pub fn for_slot(slot: usize) -> ProgramKind {
        Self::ALL[slot % PROGRAM_COUNT]
    }

    /// True if the program samples a mask buffer on texture unit 1.
    pub fn samples_mask(self) -> bool {
        matches!(
            self,
            ProgramKind::Masked
                | ProgramKind::MaskedInverted
                | ProgramKind::MaskedPremultiplied
                | ProgramKind::MaskedInvertedPremultiplied
        )
    }
}

/// A GL blend factor, kept symbolic so the tables are testable without GL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BlendFactor {
    Zero,
    One,
    DstColor,
    OneMinusSrcColor,
    OneMinusSrcAlpha,
}

/// Separate RGB and alpha blend factors for `glBlendFuncSeparate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BlendFunc {
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl BlendFunc {
    /// Mask generation multiplies the cleared buffer toward zero where
    /// clip shapes cover it and leaves every other pixel untouched.
    pub const MASK: BlendFunc = BlendFunc {
        src_rgb: BlendFactor::Zero,
        dst_rgb: BlendFactor::OneMinusSrcColor,
        src_alpha: BlendFactor::Zero,
        dst_alpha: BlendFactor::OneMinusSrcAlpha,
    };

    pub fn for_blend_mode(mode: BlendMode) -> BlendFunc {
        use BlendFactor::*;
        match mode {
            BlendMode::Normal => BlendFunc {
                src_rgb: One,
                dst_rgb: OneMinusSrcAlpha,
                src_alpha: One,
                dst_alpha: OneMinusSrcAlpha,
            },
            BlendMode::Additive => BlendFunc {
                src_rgb: One,
                dst_rgb: One,
                src_alpha: Zero,
                dst_alpha: One,
            },
            BlendMode::Multiplicative => BlendFunc {
                src_rgb: DstColor,
                dst_rgb: OneMinusSrcAlpha,
                src_alpha: Zero,
                dst_alpha: One,
            },
        }
    }
}

/// Human-readable description of one catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantInfo {
    pub index: usize,
    /// `None` for the mask-generation entry.
    pub blend_mode: Option<BlendMode>,
    pub mask: MaskState,
    pub premultiplied: bool,
    pub program_slot: usize,
    pub blend: BlendFunc,
}

/// Describes all 19 catalog entries in index order.
pub fn catalog() -> Vec<VariantInfo> {
    let mut out = Vec::with_capacity(SHADER_COUNT);
    out.push(VariantInfo {
        index: MASK_VARIANT,
        blend_mode: None,
        mask: MaskState::Unmasked,
        premultiplied: false,
        program_slot: MASK_VARIANT,
        blend: BlendFunc::MASK,
    });
    for mode in BlendMode::ALL {
        for premultiplied in [false, true] {
            for mask in [MaskState::Unmasked, MaskState::Masked, MaskState::MaskedInverted] {
                let index = select_for_draw(mode, mask, premultiplied);
                out.push(VariantInfo {
                    index,
                    blend_mode: Some(mode),
                    mask,
                    premultiplied,
                    program_slot: program_slot(index),
                    blend: BlendFunc::for_blend_mode(mode),
                });
            }
        }
    }
    out.sort_by_key(|v| v.index);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_unmasked_straight_is_index_1() {
        assert_eq!(select_for_draw(BlendMode::Normal, MaskState::Unmasked, false), 1);
    }

    #[test]
    fn additive_masked_inverted_straight_is_index_9() {
        let mask = MaskState::new(true, true);
        assert_eq!(select_for_draw(BlendMode::Additive, mask, false), 9);
    }

    #[test]
    fn multiplicative_masked_premultiplied_is_index_17() {
        let mask = MaskState::new(true, false);
        assert_eq!(select_for_draw(BlendMode::Multiplicative, mask, true), 17);
    }

    #[test]
    fn inverted_flag_is_ignored_when_unmasked() {
        assert_eq!(MaskState::new(false, true), MaskState::Unmasked);
    }

    #[test]
    fn catalog_covers_each_index_exactly_once() {
        let entries = catalog();
        assert_eq!(entries.len(), SHADER_COUNT);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.index, i, "entry {entry:?} out of order");
        }
    }

    #[test]
    fn additive_and_multiplicative_share_normal_programs() {
        for offset in 0..6 {
            let normal = program_slot(1 + offset);
            assert_eq!(program_slot(7 + offset), normal);
            assert_eq!(program_slot(13 + offset), normal);
            assert_eq!(normal, 1 + offset);
        }
        assert_eq!(program_slot(MASK_VARIANT), 0);
    }

    #[test]
    fn masked_variants_use_mask_sampling_programs() {
        for entry in catalog().into_iter().skip(1) {
            let kind = ProgramKind::for_slot(entry.program_slot);
            assert_eq!(
                kind.samples_mask(),
                entry.mask != MaskState::Unmasked,
                "entry {entry:?} mapped to {kind:?}"
            );
        }
    }

    #[test]
    fn normal_blend_is_premultiplied_over() {
        let f = BlendFunc::for_blend_mode(BlendMode::Normal);
        assert_eq!(f.src_rgb, BlendFactor::One);
        assert_eq!(f.dst_rgb, BlendFactor::OneMinusSrcAlpha);
        assert_eq!(f.src_alpha, BlendFactor::One);
        assert_eq!(f.dst_alpha, BlendFactor::OneMinusSrcAlpha);
    }

    #[test]
    fn additive_blend_keeps_destination_alpha() {
        let f = BlendFunc::for_blend_mode(BlendMode::Additive);
        assert_eq!((f.src_rgb, f.dst_rgb), (BlendFactor::One, BlendFactor::One));
        assert_eq!((f.src_alpha, f.dst_alpha), (BlendFactor::Zero, BlendFactor::One));
    }

    #[test]
    fn multiplicative_blend_uses_destination_color() {
        let f = BlendFunc::for_blend_mode(BlendMode::Multiplicative);
        assert_eq!(f.src_rgb, BlendFactor::DstColor);
        assert_eq!(f.dst_rgb, BlendFactor::OneMinusSrcAlpha);
        assert_eq!((f.src_alpha, f.dst_alpha), (BlendFactor::Zero, BlendFactor::One));
    }

    #[test]
    fn mask_blend_never_adds_source() {
        assert_eq!(BlendFunc::MASK.src_rgb, BlendFactor::Zero);
        assert_eq!(BlendFunc::MASK.src_alpha, BlendFactor::Zero);
        assert_eq!(catalog()[MASK_VARIANT].blend, BlendFunc::MASK);
    }
}
