use super::*;

const PAGE_URL: &str = "https://textbook.example.com/docs/foundations/";

fn sample_page() -> String {
    let intro = "Physical AI combines robotics, machine learning, and physics to build \
                 systems that act in the real world."
        .to_string();
    let body = "Sensors feed observations into a perception stack. ".repeat(30);
    format!(
        "# Foundations of Physical AI\n{intro}\n## Perception\n{body}\n### Cameras\nDepth \
         cameras estimate distance per pixel.\n"
    )
}

#[test]
fn chunks_are_never_empty() {
    let chunks = chunk_text(&sample_page(), PAGE_URL, &ChunkerConfig::default());
    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert!(!chunk.content.trim().is_empty());
    }
}

#[test]
fn heading_hierarchy_depth_is_bounded() {
    let text = "# One\na\n## Two\nb\n### Three\nc\n#### Four\nbody under deep heading\n";
    let chunks = chunk_text(text, PAGE_URL, &ChunkerConfig::default());
    for chunk in &chunks {
        assert!(chunk.heading_hierarchy.len() <= 3);
    }

    // Level-4 markers are body text, not metadata
    assert!(chunks.iter().any(|c| c.content.contains("#### Four")));
}

#[test]
fn headings_update_chapter_and_section() {
    let chunks = chunk_text(&sample_page(), PAGE_URL, &ChunkerConfig::default());

    let intro = &chunks[0];
    assert_eq!(intro.chapter, "Foundations of Physical AI");
    assert_eq!(intro.section, "");

    let perception = chunks
        .iter()
        .find(|c| c.section == "Perception")
        .expect("section chunk exists");
    assert_eq!(perception.chapter, "Foundations of Physical AI");

    let cameras = chunks
        .iter()
        .find(|c| c.content.contains("Depth"))
        .expect("subsection chunk exists");
    assert_eq!(
        cameras.heading_hierarchy,
        vec!["Foundations of Physical AI", "Perception", "Cameras"]
    );
}

#[test]
fn size_threshold_splits_long_sections() {
    let config = ChunkerConfig {
        max_chunk_chars: 200,
        ..ChunkerConfig::default()
    };
    let chunks = chunk_text(&sample_page(), PAGE_URL, &config);

    let perception_chunks = chunks.iter().filter(|c| c.section == "Perception").count();
    assert!(perception_chunks > 1, "long section should split");
}

#[test]
fn overlap_carries_predecessor_tail() {
    let text = format!(
        "# Chapter\nfirst line of part one\nsecond line of part one\n{}\nlast line of part \
         one\nnext part begins here\n{}",
        "filler sentence for length. ".repeat(40),
        "more filler to force another chunk boundary. ".repeat(40)
    );
    let config = ChunkerConfig {
        max_chunk_chars: 300,
        overlap_lines: 2,
    };
    let chunks = chunk_text(&text, PAGE_URL, &config);
    assert!(chunks.len() >= 2);

    for pair in chunks.windows(2) {
        assert!(
            pair[1].content.contains("(continued)"),
            "every follow-up chunk carries the continuation marker"
        );
    }
    // The first chunk never gets a prefix
    assert!(!chunks[0].content.contains("(continued)"));
}

#[test]
fn chapter_falls_back_to_url_segment() {
    let chunks = chunk_text(
        "no headings on this page, just prose about sensors and actuators",
        PAGE_URL,
        &ChunkerConfig::default(),
    );
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].chapter, "foundations");
}

#[test]
fn quality_scores_are_clamped() {
    let chunks = chunk_text(&sample_page(), PAGE_URL, &ChunkerConfig::default());
    for chunk in &chunks {
        assert!((0.0..=1.0).contains(&chunk.quality_score));
    }
}
