use regex::Regex;
use std::sync::LazyLock;

/// Keyword density heuristics that decide which extraction passes are worth
/// an LLM call for a given chapter, grounded in `router.py`. Characters
/// always runs; Systems/Events/Lore are gated on these counts.
pub static SYSTEM_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:skill|level|class|title|stat|ability|evolution|upgrade|breakthrough|acquired|learned|gained|earned|obtained|evolves?|rank(?:ed)?|tier|profession|bloodline|blessing|notification|system\s+message|compétence|classe|titre|niveau|amélioration|évolution|acquis|appris|obtenu|déverrouillé|débloqué|grade|rang|bénédiction|aptitude|maîtrise|lignée|montée\s+de\s+niveau|gain\s+de\s+niveau)\b|\+\d+\s+\w+|Level:\s*\d+|Niveau\s*:\s*\d+|\[(?:Skill|Ability|Class|Title|Compétence|Classe|Titre)",
    )
    .expect("SYSTEM_KEYWORDS is a valid pattern")
});

pub static EVENT_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:battle|fight|killed|defeated|died|death|attacked|ambush|discovered|revealed|betrayed|alliance|war|peace|quest|mission|escaped|captured|saved|rescued|ceremony|ritual|awakened|transformed|arrived|departed|journeyed|traveled|fled|swore|promised|decided|agreed|refused|combat|batail|tué|vaincu|mort|attaqué|embuscade|découvert|révélé|trahi|guerre|paix|quête|échappé|capturé|sauvé|secouru|cérémonie|rituel|éveillé|transformé|arrivé|parti|voyagé|fui|enfui|juré|promis|décidé|accepté|refusé|affronté|blessé|survécu|détruit|rencontré)\b",
    )
    .expect("EVENT_KEYWORDS is a valid pattern")
});

pub static LORE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:dungeon|realm|dimension|continent|kingdom|city|temple|forest|tower|artifact|weapon|potion|elixir|enchant|rune|creature|monster|beast|dragon|demon|spirit|guild|order|faction|clan|church|empire|council|mana|energy|dao|cultivation|magic|law|rule|race|species|elf|dwarf|goblin|orc|undead|ancient|prophecy|legend|myth|lore|donjon|royaume|continent|ville|temple|forêt|tour|artefact|arme|potion|élixir|enchant|rune|créature|monstre|bête|dragon|démon|esprit|guilde|ordre|faction|clan|église|empire|conseil|énergie|magie|loi|règle|espèce|elfe|nain|gobelin|orc|mort-vivant|ancien|prophétie|légende|mythe|savoir|tutoriel|univers|système|initiation)\b",
    )
    .expect("LORE_KEYWORDS is a valid pattern")
});

pub const SYSTEM_THRESHOLD: usize = 2;
pub const EVENT_THRESHOLD: usize = 2;
pub const LORE_THRESHOLD: usize = 3;
pub const SHORT_CHAPTER_CHARS: usize = 2000;
