//! Text track selection and WebVTT to plain text conversion

use crate::types::VimeoTextTrack;

fn is_likely_english(track: &VimeoTextTrack) -> bool {
    track
        .language
        .as_deref()
        .map(|lang| lang.to_lowercase().starts_with("en"))
        .unwrap_or(false)
}

/// Pick the track to transcribe.
///
/// Tracks without a `uri` are ignored. Active tracks win over inactive ones;
/// within the chosen group an English track wins, else the first one.
pub fn pick_preferred_track(tracks: &[VimeoTextTrack]) -> Option<&VimeoTextTrack> {
    let usable: Vec<&VimeoTextTrack> = tracks.iter().filter(|t| !t.uri.is_empty()).collect();

    let active: Vec<&VimeoTextTrack> = usable.iter().copied().filter(|t| t.active).collect();
    let group = if active.is_empty() { usable } else { active };

    group
        .iter()
        .copied()
        .find(|t| is_likely_english(t))
        .or_else(|| group.first().copied())
}

/// Display label: name, else upper-cased language, else track type.
pub fn track_label(track: &VimeoTextTrack) -> String {
    track
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .or_else(|| track.language.as_ref().map(|l| l.to_uppercase()))
        .or_else(|| track.kind.clone())
        .unwrap_or_else(|| "Text Track".to_string())
}

/// Strip WebVTT down to its cue text.
///
/// Header, numeric cue indexes and timing lines are dropped. Lines of one
/// cue are joined with a space; cues are separated by newlines.
pub fn webvtt_to_plain_text(vtt: &str) -> String {
    let mut cues: Vec<String> = Vec::new();
    let mut buffer = String::new();

    fn flush(buffer: &mut String, cues: &mut Vec<String>) {
        let text = buffer.trim();
        if !text.is_empty() {
            cues.push(text.to_string());
        }
        buffer.clear();
    }

    for line in vtt.lines() {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            flush(&mut buffer, &mut cues);
            continue;
        }
        if trimmed.starts_with("WEBVTT") {
            continue;
        }
        if trimmed.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if trimmed.contains("-->") {
            flush(&mut buffer, &mut cues);
            continue;
        }

        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(trimmed);
    }
    flush(&mut buffer, &mut cues);

    cues.join("\n")
}
