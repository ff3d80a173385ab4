//! The `classquiz init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("classquiz.toml").exists() {
        println!("classquiz.toml already exists, skipping.");
    } else {
        std::fs::write("classquiz.toml", SAMPLE_CONFIG)?;
        println!("Created classquiz.toml");
    }

    std::fs::create_dir_all("quizzes")?;
    let example_path = std::path::Path::new("quizzes/example.json");
    if example_path.exists() {
        println!("quizzes/example.json already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_QUIZ)?;
        println!("Created quizzes/example.json");
    }

    println!("\nNext steps:");
    println!("  1. Edit classquiz.toml with your LMS backend URL");
    println!("  2. Run: classquiz validate --quiz quizzes/example.json");
    println!("  3. Run: classquiz take --quiz quizzes/example.json --student-id me --offline");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# classquiz configuration

pass_threshold = 60

[backend]
base_url = "http://localhost:8000"
# api_token = "${CLASSQUIZ_API_TOKEN}"
timeout_secs = 30
single_attempt = true

[timing]
session_budget_secs = 1800
auto_advance_ms = 500
auto_submit_countdown_secs = 3
refresh_interval_secs = 10
"#;

const EXAMPLE_QUIZ: &str = r#"{
  "id": "example",
  "fileName": "Example quiz",
  "instructions": "Three warm-up questions",
  "classId": "demo",
  "quiz": [
    {
      "question": "What is 2 + 2?",
      "options": ["3", "4", "5", "22"],
      "correct_answer": "4",
      "explanation": "Two plus two is four."
    },
    {
      "question": "Which planet is closest to the Sun?",
      "options": ["Venus", "Earth", "Mercury", "Mars"],
      "correct_answer": "Mercury"
    },
    {
      "question": "How many sides does a hexagon have?",
      "options": ["5", "6", "7", "8"],
      "answer": "6"
    }
  ]
}
"#;
