//! Mention detection as seen from outside the crate (spec §4.9): word-boundary
//! anchoring, longest-span overlap resolution, and the grounding invariant
//! that every [`Mention`] reproduces exactly from its own offsets, exercised
//! against a richer multi-entity fixture than the in-module unit tests.

use worldrag::models::entity::EntityKind;
use worldrag::models::mention::MentionType;
use worldrag::extraction::mention_detector::detect_mentions;

fn chapter_text() -> &'static str {
    "Jake Thayne stood beside Mira Voss at the gate. Jake drew the Kinetic Draw \
     and fired past Mira. The old Hunter, Jakesson, watched from the wall, \
     unseen by Jake Thayne or by Mira."
}

#[test]
fn multi_entity_fixture_grounds_every_mention_in_the_source_text() {
    let text = chapter_text();
    let entities = vec![
        ("Jake Thayne".to_string(), EntityKind::Character, false),
        ("Jake".to_string(), EntityKind::Character, true),
        ("Mira Voss".to_string(), EntityKind::Character, false),
        ("Mira".to_string(), EntityKind::Character, true),
        ("Kinetic Draw".to_string(), EntityKind::Skill, false),
        ("Hunter".to_string(), EntityKind::Character, true),
    ];

    let mentions = detect_mentions(text, &entities, "book1", 4);
    assert!(!mentions.is_empty());
    for mention in &mentions {
        assert!(mention.is_grounded_in(text), "mention {:?} must reproduce from its own offsets", mention);
    }
}

#[test]
fn full_name_mentions_win_over_the_shorter_alias_at_the_same_position() {
    let text = chapter_text();
    let entities = vec![
        ("Jake Thayne".to_string(), EntityKind::Character, false),
        ("Jake".to_string(), EntityKind::Character, true),
    ];

    let mentions = detect_mentions(text, &entities, "book1", 4);
    let full_name_count = mentions.iter().filter(|m| m.mention_text == "Jake Thayne").count();
    assert_eq!(full_name_count, 2, "both occurrences of the full name should be kept, not just the alias");
    assert!(mentions.iter().all(|m| m.mention_text != "Jake"), "a bare alias nested inside the full name must not also be emitted");
}

#[test]
fn substring_inside_an_unrelated_word_is_never_matched() {
    let text = "Jakesson walked beside Jake, who waved back.";
    let entities = vec![("Jake".to_string(), EntityKind::Character, true)];
    let mentions = detect_mentions(text, &entities, "book1", 4);
    assert_eq!(mentions.len(), 1, "only the standalone occurrence should match, not the one embedded in Jakesson");
    assert_eq!(mentions[0].mention_text, "Jake");
    assert!(text[..mentions[0].char_start].ends_with("beside "));
}

#[test]
fn alias_entries_are_tagged_distinctly_from_direct_names() {
    let text = "Mira Voss smiled. Mira waved back.";
    let entities = vec![
        ("Mira Voss".to_string(), EntityKind::Character, false),
        ("Mira".to_string(), EntityKind::Character, true),
    ];
    let mentions = detect_mentions(text, &entities, "book1", 2);

    let direct = mentions.iter().find(|m| m.mention_text == "Mira Voss").expect("direct name mention");
    assert_eq!(direct.mention_type, MentionType::DirectName);

    let alias = mentions.iter().find(|m| m.mention_text == "Mira" && m.char_start > direct.char_end);
    assert!(alias.is_some(), "the bare alias occurrence after the full name should still be detected");
    assert_eq!(alias.unwrap().mention_type, MentionType::Alias);
}

#[test]
fn empty_entity_list_produces_no_mentions() {
    let mentions = detect_mentions(chapter_text(), &[], "book1", 4);
    assert!(mentions.is_empty());
}
