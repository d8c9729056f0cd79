//! Writes a synthetic student-performance dataset for trying the pipeline.
//!
//! Usage: `generate_sample [OUTPUT]` (default `notebook/data/stud.csv`).

use std::path::PathBuf;

use anyhow::Context;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const ROWS: usize = 1000;

const GENDERS: [&str; 2] = ["female", "male"];
const GROUPS: [&str; 5] = ["group A", "group B", "group C", "group D", "group E"];
const EDUCATION: [(&str, f64); 6] = [
    ("some high school", -3.0),
    ("high school", -2.0),
    ("some college", 0.0),
    ("associate's degree", 1.0),
    ("bachelor's degree", 2.5),
    ("master's degree", 3.5),
];

/// Box-Muller transform for normal distribution
fn gauss(rng: &mut ChaCha8Rng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

fn score(value: f64) -> i64 {
    value.round().clamp(0.0, 100.0) as i64
}

fn main() -> anyhow::Result<()> {
    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("notebook/data/stud.csv"));
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut writer =
        csv::Writer::from_path(&output).with_context(|| format!("creating {}", output.display()))?;
    writer.write_record([
        "gender",
        "race_ethnicity",
        "parental_level_of_education",
        "lunch",
        "test_preparation_course",
        "math_score",
        "reading_score",
        "writing_score",
    ])?;

    for _ in 0..ROWS {
        let male = rng.gen_bool(0.48);
        let group = rng.gen_range(0..GROUPS.len());
        let (education, education_effect) = EDUCATION[rng.gen_range(0..EDUCATION.len())];
        let standard_lunch = rng.gen_bool(0.65);
        let prepared = rng.gen_bool(0.36);

        // Shared ability drives all three scores.
        let ability = gauss(&mut rng, 66.0, 13.0)
            + education_effect
            + if standard_lunch { 4.0 } else { -6.0 }
            + group as f64 * 1.5;
        let reading = ability + if male { -3.5 } else { 3.5 } + if prepared { 4.0 } else { 0.0 };
        let writing = reading + gauss(&mut rng, 0.0, 4.0) + if prepared { 3.0 } else { 0.0 };
        let math = ability + if male { 5.0 } else { -5.0 } + gauss(&mut rng, 0.0, 5.0);

        writer.write_record([
            GENDERS[male as usize].to_string(),
            GROUPS[group].to_string(),
            education.to_string(),
            if standard_lunch { "standard" } else { "free/reduced" }.to_string(),
            if prepared { "completed" } else { "none" }.to_string(),
            score(math).to_string(),
            score(reading + gauss(&mut rng, 0.0, 3.0)).to_string(),
            score(writing).to_string(),
        ])?;
    }
    writer.flush()?;

    println!("Wrote {ROWS} rows to {}", output.display());
    Ok(())
}
