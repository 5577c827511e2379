use crate::ontology::keywords::{
    EVENT_KEYWORDS, EVENT_THRESHOLD, LORE_KEYWORDS, LORE_THRESHOLD, SHORT_CHAPTER_CHARS,
    SYSTEM_KEYWORDS, SYSTEM_THRESHOLD,
};
use crate::models::RegexMatch;

/// One of the four LLM extraction passes, used as a conditional fan-out
/// point — characters always runs, the rest are gated on keyword density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExtractionPass {
    Characters,
    Systems,
    Events,
    Lore,
}

fn is_progression_genre(genre: &str) -> bool {
    matches!(
        genre.to_lowercase().as_str(),
        "litrpg" | "progression_fantasy" | "cultivation"
    )
}

/// Decides which extraction passes are worth the LLM cost for a chapter,
/// grounded in `router.py::route_extraction_passes`. Short chapters run
/// every pass since there isn't enough text to build confident keyword
/// counts; longer chapters are routed by keyword density and Passe 0 regex
/// hit density.
pub fn route_extraction_passes(
    chapter_text: &str,
    genre: &str,
    regex_matches: &[RegexMatch],
) -> Vec<ExtractionPass> {
    use ExtractionPass::*;

    if chapter_text.len() < SHORT_CHAPTER_CHARS {
        return vec![Characters, Systems, Events, Lore];
    }

    let system_hits = SYSTEM_KEYWORDS.find_iter(chapter_text).count();
    let event_hits = EVENT_KEYWORDS.find_iter(chapter_text).count();
    let lore_hits = LORE_KEYWORDS.find_iter(chapter_text).count();
    let has_regex_matches = !regex_matches.is_empty();

    let mut passes = vec![Characters];

    if system_hits >= SYSTEM_THRESHOLD
        || has_regex_matches
        || (is_progression_genre(genre) && system_hits >= 1)
    {
        passes.push(Systems);
    }

    if event_hits >= EVENT_THRESHOLD {
        passes.push(Events);
    }

    if lore_hits >= LORE_THRESHOLD {
        passes.push(Lore);
    }

    if !passes.contains(&Events) && event_hits >= 1 {
        passes.push(Events);
    }

    tracing::info!(
        system_hits,
        event_hits,
        lore_hits,
        has_regex_matches,
        genre,
        passes = ?passes,
        "extraction_routing_decided",
    );

    passes
}
