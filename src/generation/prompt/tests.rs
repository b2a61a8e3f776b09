use super::*;

fn context(id: &str, content: &str, score: f32) -> RetrievedContext {
    RetrievedContext {
        id: id.to_string(),
        content: content.to_string(),
        url: format!("https://textbook.example.com/docs/{id}"),
        chapter: "Foundations".to_string(),
        section: "Overview".to_string(),
        heading_hierarchy: vec!["Foundations".to_string()],
        similarity_score: score,
    }
}

#[test]
fn repetitive_boilerplate_contexts_are_dropped() {
    let contexts = vec![
        context(
            "good",
            "Inverse kinematics computes joint angles from a desired end effector pose.",
            0.9,
        ),
        context(
            "bad",
            "Complete learning path for robots. Complete learning path again and again.",
            0.8,
        ),
    ];

    let filtered = filter_repetitive_contexts(&contexts);

    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, "good");
}

#[test]
fn high_token_repetition_is_dropped() {
    let contexts = vec![context("loop", "robot robot robot robot robot robot arm", 0.9)];
    assert!(filter_repetitive_contexts(&contexts).is_empty());
}

#[test]
fn format_context_numbers_and_dedups() {
    let body = "Sensors measure the state of the robot and its environment.";
    let contexts = vec![
        context("a", body, 0.9),
        context("b", body, 0.8),
        context("c", "Actuators apply forces and torques to move the robot.", 0.7),
    ];

    let formatted = format_context(&contexts);

    assert!(formatted.contains("Context 1:"));
    assert!(formatted.contains("Context 2:"));
    assert!(!formatted.contains("Context 3:"));
    assert!(formatted.contains("Chapter: Foundations"));
    assert!(formatted.contains("Similarity Score: 0.9"));
}

#[test]
fn format_history_alternates_q_and_a() {
    let history = vec![
        ("What is a robot?".to_string(), "A programmable machine.".to_string()),
        ("Can they walk?".to_string(), "Some can, with legged locomotion.".to_string()),
    ];

    let formatted = format_history(&history);

    assert!(formatted.contains("Q1: What is a robot?"));
    assert!(formatted.contains("A1: A programmable machine."));
    assert!(formatted.contains("Q2: Can they walk?"));
}

#[test]
fn prompt_includes_preference_instructions() {
    let prompt = build_prompt(
        "What is torque?",
        "Context 1:\nContent: Torque is rotational force.\n---\n",
        "",
        UserPreferences {
            detail_level: DetailLevel::Advanced,
            response_format: ResponseFormat::Concise,
        },
    );

    assert!(prompt.contains("QUESTION: What is torque?"));
    assert!(prompt.contains(DetailLevel::Advanced.instruction()));
    assert!(prompt.contains(ResponseFormat::Concise.instruction()));
    assert!(!prompt.contains("CONVERSATION HISTORY"));
}

#[test]
fn prompt_with_history_adds_followup_instruction() {
    let prompt = build_prompt(
        "And its units?",
        "Context 1:\nContent: Torque is rotational force.\n---\n",
        "Q1: What is torque?\nA1: Rotational force.",
        UserPreferences::default(),
    );

    assert!(prompt.contains("CONVERSATION HISTORY"));
    assert!(prompt.contains("follow-up questions"));
}

#[test]
fn fallback_prompt_names_the_question() {
    let prompt = build_fallback_prompt("What is dark matter?");
    assert!(prompt.contains("What is dark matter?"));
    assert!(prompt.contains("couldn't find specific textbook content"));
}

#[test]
fn preference_enums_deserialize_from_lowercase() {
    let prefs: UserPreferences =
        serde_json::from_str(r#"{"detail_level":"basic","response_format":"examples"}"#).unwrap();
    assert_eq!(prefs.detail_level, DetailLevel::Basic);
    assert_eq!(prefs.response_format, ResponseFormat::Examples);

    let defaults: UserPreferences = serde_json::from_str("{}").unwrap();
    assert_eq!(defaults, UserPreferences::default());
}
