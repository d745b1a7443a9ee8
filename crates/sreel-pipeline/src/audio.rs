//! Narration audio acquisition.
//!
//! Block text is split into sub-clips at sentence punctuation; each
//! sub-clip is synthesized and written separately so subtitle timing can
//! follow the sub-clip durations exactly.

use sreel_providers::{SpeechSynth, VoiceParams};
use sreel_store::{atomic_write, ProjectLayout};
use tracing::{debug, info};

use crate::error::PipelineResult;

/// Punctuation that ends a sub-clip. CJK full-width marks first, since
/// scripts are commonly authored with them.
const SPLIT_CHARS: &[char] = &['，', '。', '？', '！', '；', '.', '?', '!', ';'];

/// Split narration text into sub-clips at sentence punctuation.
///
/// Empty segments collapse, so trailing punctuation and runs of marks do
/// not produce empty sub-clips. Text with no split marks yields itself as
/// the single sub-clip.
pub fn split_into_subclips(text: &str) -> Vec<String> {
    text.split(|c| SPLIT_CHARS.contains(&c))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Synthesize every sub-clip of a block's narration, returning the ordered
/// asset refs. Sub-clips whose file already exists are kept untouched
/// unless `regen` is set.
pub async fn synthesize_block_audio(
    synth: &dyn SpeechSynth,
    voice: &VoiceParams,
    layout: &ProjectLayout,
    block_index: usize,
    text: &str,
    regen: bool,
) -> PipelineResult<Vec<String>> {
    let subclips = split_into_subclips(text);
    let mut refs = Vec::with_capacity(subclips.len());

    for (sub_index, subclip) in subclips.iter().enumerate() {
        let audio_ref = layout.audio_ref(block_index, sub_index);
        let path = layout.resolve(&audio_ref);

        if path.exists() && !regen {
            debug!(block = block_index, sub = sub_index, "Audio sub-clip cached");
            refs.push(audio_ref);
            continue;
        }

        let bytes = synth.synthesize(subclip, voice).await?;
        atomic_write(&path, &bytes).await?;
        refs.push(audio_ref);
    }

    info!(
        block = block_index,
        subclips = refs.len(),
        "Narration audio ready"
    );
    Ok(refs)
}

/// Whether every audio sub-clip the block would need already exists.
///
/// The sub-clip count is derived from the text, not from the stored refs,
/// so edited text invalidates the cache even when older files remain.
pub fn audio_is_cached(layout: &ProjectLayout, block_index: usize, text: &str) -> bool {
    let subclips = split_into_subclips(text);
    if subclips.is_empty() {
        return false;
    }
    (0..subclips.len()).all(|sub| layout.resolve(&layout.audio_ref(block_index, sub)).exists())
}
