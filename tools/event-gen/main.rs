use clap::Parser;
use kiroku::recording::{DeviceMessage, InteractionEvent};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use std::fs;

const APPS: &[&str] = &["com.android.chrome", "com.google.android.gm", "com.spotify.music"];
const BUTTONS: &[(&str, &str)] = &[
    ("com.app:id/login", "Log in"),
    ("com.app:id/next", "Next"),
    ("com.app:id/search", "Search"),
    ("com.app:id/add_to_cart", "Add to cart"),
];
const FIELDS: &[(&str, &str)] = &[
    ("com.app:id/username", "denise@example.com"),
    ("com.app:id/query", "wireless headphones"),
    ("com.app:id/note", "call back tomorrow"),
];
const SCROLLS: &[&str] = &["scroll_down", "scroll_up", "swipe_left", "swipe_right"];

/// A CLI tool to generate synthetic recording logs for kiroku-cli
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The path to write the generated JSON-lines file to
    #[arg(short, long, default_value = "generated_events.jsonl")]
    output: String,

    /// Number of user steps to generate (a typed word or a scroll run counts as one)
    #[arg(long, default_value_t = 20)]
    steps: usize,

    /// Probability that a message is delivered twice
    #[arg(long, default_value_t = 0.05)]
    duplicate_rate: f64,

    /// Seed for a reproducible log
    #[arg(long)]
    seed: Option<u64>,
}

struct Generator {
    rng: StdRng,
    sequence: u64,
    messages: Vec<DeviceMessage>,
    duplicate_rate: f64,
}

impl Generator {
    fn push(&mut self, mut event: InteractionEvent) {
        self.sequence += 1;
        event.sequence_number = Some(self.sequence);
        let message = DeviceMessage::captured(event);
        if self.rng.random_bool(self.duplicate_rate) {
            self.messages.push(message.clone());
        }
        self.messages.push(message);
    }

    fn open_app(&mut self) {
        let package = APPS.choose(&mut self.rng).copied().unwrap_or("com.android.chrome");
        self.push(InteractionEvent::new("open_app").with_package(package));
    }

    fn tap(&mut self) {
        let (resource_id, text) = BUTTONS.choose(&mut self.rng).copied().unwrap_or(BUTTONS[0]);
        let x = self.rng.random_range(80.0..1000.0);
        let y = self.rng.random_range(200.0..2000.0);
        self.push(
            InteractionEvent::new("tap")
                .with_resource_id(resource_id)
                .with_text(text)
                .with_position(x, y),
        );
    }

    /// Partial keystroke flushes of one value, growing a few characters at a time.
    fn type_text(&mut self) {
        let (resource_id, value) = FIELDS.choose(&mut self.rng).copied().unwrap_or(FIELDS[0]);
        let chars: Vec<char> = value.chars().collect();
        let mut end = 0;
        while end < chars.len() {
            end = (end + self.rng.random_range(1..=4)).min(chars.len());
            let partial: String = chars[..end].iter().collect();
            self.push(
                InteractionEvent::new("set_text")
                    .with_resource_id(resource_id)
                    .with_text(&partial),
            );
        }
    }

    fn scroll_run(&mut self) {
        let event_type = SCROLLS.choose(&mut self.rng).copied().unwrap_or("scroll_down");
        let repeats = self.rng.random_range(1..=6);
        let x = self.rng.random_range(300.0..700.0);
        let y = self.rng.random_range(800.0..1600.0);
        for _ in 0..repeats {
            self.push(InteractionEvent::new(event_type).with_position(x, y));
        }
    }

    fn back(&mut self) {
        self.push(InteractionEvent::new("back"));
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if !(0.0..=1.0).contains(&cli.duplicate_rate) {
        eprintln!(
            "Error: --duplicate-rate ({}) must be between 0 and 1",
            cli.duplicate_rate
        );
        std::process::exit(1);
    }

    let rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let mut generator = Generator {
        rng,
        sequence: 0,
        messages: vec![DeviceMessage::RecordingStarted {
            session: "generated".to_string(),
            target_app: None,
        }],
        duplicate_rate: cli.duplicate_rate,
    };

    println!("Generating a recording log with {} steps...", cli.steps);
    generator.open_app();
    for _ in 0..cli.steps {
        match generator.rng.random_range(0..10) {
            0..=3 => generator.tap(),
            4..=5 => generator.type_text(),
            6..=8 => generator.scroll_run(),
            _ => generator.back(),
        }
    }
    generator.messages.push(DeviceMessage::RecordingStopped {});

    let lines = generator
        .messages
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    fs::write(&cli.output, lines.join("\n") + "\n")?;

    println!(
        "Successfully generated {} messages and saved them to '{}'",
        generator.messages.len(),
        cli.output
    );

    Ok(())
}
