use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Maximum entity name length before it's treated as LLM commentary rather
/// than a name, grounded in `entity_filter.py::MAX_ENTITY_NAME_LENGTH`.
pub const MAX_ENTITY_NAME_LENGTH: usize = 80;

pub static PRONOUNS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "il", "elle", "ils", "elles", "je", "tu", "nous", "vous", "on", "lui", "leur", "eux",
        "me", "te", "se", "soi", "celui", "celle", "ceux", "celles", "celui-ci", "celle-ci",
        "ceux-ci", "celles-ci", "celui-la", "celle-la", "ceux-la", "celles-la", "celui-là",
        "celle-là", "ceux-là", "celles-là", "ce", "ceci", "cela", "ca", "ça", "qui", "que",
        "quoi", "dont", "où", "y", "en", "he", "she", "it", "they", "him", "her", "them", "his",
        "hers", "its", "theirs", "this", "that", "these", "those", "who", "whom", "which",
        "what", "i", "we", "you", "us", "myself", "himself", "herself", "itself", "themselves",
    ]
    .into_iter()
    .collect()
});

pub static GARBAGE_NAMES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "null", "none", "unknown", "n/a", "na", "undefined", "unnamed", "???", "...", "—", "-",
        "?",
    ]
    .into_iter()
    .collect()
});

pub static GENERIC_CONCEPTS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "magie", "puissance", "pouvoir", "force", "combat", "bataille", "guerre", "mort", "vie",
        "amour", "haine", "peur", "colère", "temps", "espace", "lumière", "lumiere",
        "obscurité", "obscurite", "bien", "mal", "nature", "énergie", "energie", "vitesse",
        "agilité", "agilite", "endurance", "intelligence", "sagesse", "charisme", "chance",
        "destin", "mana", "survie", "évolution", "evolution", "progression", "croissance",
        "récompense", "recompense", "punition", "danger", "sécurité", "securite", "magic",
        "power", "strength", "battle", "war", "death", "life", "love", "hate", "fear", "anger",
        "time", "space", "light", "darkness", "good", "evil", "energy", "speed", "agility",
        "wisdom", "charisma", "luck", "fate", "health", "stamina", "perception", "willpower",
        "toughness", "dexterity", "constitution", "vitality", "survival", "growth", "reward",
        "punishment", "safety",
    ]
    .into_iter()
    .collect()
});

fn compile_all(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|s| Regex::new(s).expect("quality-filter pattern is valid regex"))
        .collect()
}

pub static GENERIC_CHARACTER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?i)^(?:le|la|l['']\s?|les|un|une|des|du|ce|cet|cette|ces|son|sa|ses|leur|leurs)\s+(?:homme|femme|guerrier|guerrière|soldat|mage|sorcier|sorcière|créature|monstre|ennemi|ennemie|assaillant|assaillante|étranger|étrangère|inconnu|inconnue|individu|personne|enfant|vieillard|vieil\s+homme|vieille\s+femme|garçon|fille|type|gars|mec|nana|chose|bête|bete|animal|silhouette|ombre|figure|voix|archer|manieur|lanceur|combattant|combattante|blaireau|sanglier|marcassin|cochon|loup|ours|serpent|vipère|premier|première|deuxième|troisième|quatrième|dernier|dernière|autre|compagnon|compagne|ami|amie|allié|alliée|adversaire|rival|rivale)\b",
        r"(?i)^(?:le|la)\s+\d+(?:er|ère|e|ème|ième)\b",
        r"(?i)^(?:ce|cet|cette|ces)\s+\w+",
        r"(?i)^(?:the|a|an|some|this|that)\s+(?:man|woman|warrior|soldier|mage|sorcerer|sorceress|creature|monster|enemy|attacker|stranger|unknown|individual|person|child|old\s+man|old\s+woman|boy|girl|guy|figure|shadow|voice|thing|archer|axe\s+wielder|fighter|beast|badger|boar|wolf|bear|snake|viper|first|second|third|fourth|last|other|companion|friend|ally|adversary|rival)\b",
        r"(?i)^.+['']s\s+(?:friend|best\s+friend|girlfriend|boyfriend|wife|husband|ex-girlfriend|ex-boyfriend|ex-wife|ex-husband|ex-best\s+friend|father|mother|brother|sister|son|daughter|uncle|aunt|cousin|partner|ally|companion|mentor|teacher|student|rival)\b",
        r"(?i)^(?:unnamed|unknown|mysterious|anonymous|unidentified)?\s*(?:protagonist|antagonist|hero|heroine|villain|narrator|silhouette|figure|shadow|voice)\b",
        r"(?i)^(?:parents|family|groupe|group)$",
    ])
});

pub static GENERIC_ITEM_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?i)^(?:le|la|l['']\s?|les|un|une|des|du|son|sa|ses)\s+(?:épée|epée|arme|potion|armure|bouclier|arc|flèche|fleche|bâton|baton|anneau|pendentif|robe|bottes|gants|casque|sac|clé|cle|livre|parchemin|pierre|cristal|fiole|baguette|dague|lance|hache|masse|marteau|cape|tunique|ceinture|épaulières|jambières|plastron|bracelet|collier|carquois|munitions|flèches)\b",
        r"(?i)^(?:the|a|an|some|his|her|their)\s+(?:sword|weapon|potion|armor|shield|bow|arrow|staff|ring|pendant|robe|boots|gloves|helmet|bag|key|book|scroll|stone|crystal|vial|wand|dagger|spear|axe|mace|hammer|cape|tunic|belt|quiver|ammunition)\b",
    ])
});

pub static GENERIC_LOCATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?i)^(?:le|la|l['']\s?|les|un|une|des|du)\s+(?:forêt|foret|pièce|piece|salle|grotte|route|chemin|ville|village|montagne|rivière|riviere|lac|mer|océan|ocean|plaine|champ|colline|vallée|vallee|désert|desert|maison|bâtiment|batiment|auberge|taverne|marché|marche|arbre|buisson|rocher|pierre|clairière|clairiere|sous-bois|bosquet|sentier|pont|mur|porte|ascenseur|escalier|couloir|bureau|pilier|dôme|dome)\b",
        r"(?i)^(?:ce|cet|cette|ces)\s+(?:forêt|foret|bois|endroit|lieu|place|monde|village|ville|montagne|salle|pièce|cave|grotte)\b",
        r"(?i)^(?:des|les)\s+(?:arbres|bois|rochers|pierres|buissons|champs|collines)\b",
        r"(?i)^(?:sous-bois|open\s+space|rez-de-chaussée|rez-de-chausse)$",
        r"(?i)^(?:un|une)\s+(?:petit|petite|grand|grande|énorme|immense|vaste|sombre|vieux|vieille|ancien|ancienne)\s+",
        r"(?i)^(?:au\s+nord|au\s+sud|à\s+l['']\s?est|à\s+l['']\s?ouest|north|south|east|west|nearby|outside|inside|dehors|dedans|ici|là|là-bas|là-haut|ici-bas|ailleurs)\b",
        r"(?i)^(?:the|a|an)\s+(?:forest|room|cave|road|path|city|town|village|mountain|river|lake|sea|ocean|plain|field|hill|valley|desert|house|building|inn|tavern|market|tree|bush|clearing)\b",
        r"(?i)^(?:current\s+location|unknown\s+|here-below|here|there)\b",
    ])
});

pub static GENERIC_SKILL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?i)^(?:compétence|competence|compétences|competences)\s+(?:de|d['']\s?|pour|en)\s+",
        r"(?i)^(?:maniement|maîtrise|maitrise|utilisation)\s+(?:de|d['']\s?|des)\s+",
        r"(?i)^(?:les?\s+)?(?:armes?\s+(?:de\s+lancer|à\s+(?:deux|une)\s+mains?)|(?:l['']\s?)?épée\s+et\s+(?:le\s+)?bouclier|double\s+maniement\s+des?\s+armes?)\b",
        r"(?i)^(?:skill\s+(?:with|in|for|at)\s+|proficiency\s+(?:with|in)\s+|ability\s+to\s+)\b",
    ])
});

pub static GENERIC_FACTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:le|la|les|un|une|des|the|a|an)\s+(?:soldats|gardes|ennemis|alliés|allies|foule|groupe|soldiers|guards|enemies|allies|crowd|group)\b")
        .expect("faction pattern is valid regex")
});

pub static TRIVIAL_EVENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:il|elle|he|she|they|on|ils|elles)\s+(?:marche|mange|dort|parle|walked|ate|slept|talked|sat|stood)\b")
        .expect("trivial-event pattern is valid regex")
});

fn matches_any(name: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|p| p.is_match(name.trim()))
}

/// Names of 1 char or empty, or over the max length, or containing LLM
/// parenthetical commentary, plus pronouns and known garbage strings.
/// Shared across all entity types (`entity_filter.py::_common_reject`).
pub fn is_common_reject(name: &str) -> bool {
    let trimmed = name.trim();
    let lower = trimmed.to_lowercase();
    if PRONOUNS.contains(lower.as_str()) || GARBAGE_NAMES.contains(lower.as_str()) {
        return true;
    }
    if trimmed.chars().count() <= 1 || trimmed.chars().count() > MAX_ENTITY_NAME_LENGTH {
        return true;
    }
    trimmed.contains('(') && trimmed.contains(')')
}

/// Single lowercase word with no spaces or hyphens — likely not a proper name.
pub fn is_all_lowercase_single_word(name: &str) -> bool {
    let trimmed = name.trim();
    if trimmed.contains(' ') || trimmed.contains('-') {
        return false;
    }
    !trimmed.is_empty() && trimmed == trimmed.to_lowercase() && trimmed.chars().all(|c| c.is_alphabetic())
}

pub fn is_generic_character(name: &str) -> bool {
    matches_any(name, &GENERIC_CHARACTER_PATTERNS)
}

pub fn is_generic_item(name: &str) -> bool {
    matches_any(name, &GENERIC_ITEM_PATTERNS)
}

pub fn is_generic_location(name: &str) -> bool {
    matches_any(name, &GENERIC_LOCATION_PATTERNS)
}

pub fn is_generic_skill(name: &str) -> bool {
    matches_any(name, &GENERIC_SKILL_PATTERNS)
}

pub fn is_generic_faction(name: &str) -> bool {
    GENERIC_FACTION_PATTERN.is_match(name.trim())
}

pub fn is_generic_concept(name: &str) -> bool {
    GENERIC_CONCEPTS.contains(name.trim().to_lowercase().as_str())
}

pub fn is_trivial_event(name: &str) -> bool {
    TRIVIAL_EVENT_PATTERN.is_match(name.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_pronouns_and_garbage() {
        assert!(is_common_reject("he"));
        assert!(is_common_reject("Il"));
        assert!(is_common_reject("null"));
        assert!(is_common_reject("x"));
        assert!(!is_common_reject("Jake Thayne"));
    }

    #[test]
    fn rejects_parenthetical_commentary() {
        assert!(is_common_reject("Forest (implied by context)"));
    }

    #[test]
    fn rejects_generic_character_descriptors() {
        assert!(is_generic_character("the warrior"));
        assert!(is_generic_character("le guerrier"));
        assert!(is_generic_character("Jake's best friend"));
        assert!(!is_generic_character("Jake Thayne"));
    }

    #[test]
    fn rejects_generic_items_and_locations() {
        assert!(is_generic_item("a sword"));
        assert!(is_generic_item("une épée"));
        assert!(is_generic_location("the forest"));
        assert!(!is_generic_location("Ragnarok Dungeon"));
    }

    #[test]
    fn single_lowercase_word_detection() {
        assert!(is_all_lowercase_single_word("slime"));
        assert!(!is_all_lowercase_single_word("Slime"));
        assert!(!is_all_lowercase_single_word("Jake Thayne"));
    }
}
