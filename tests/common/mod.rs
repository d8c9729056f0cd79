#![allow(dead_code)]

use std::path::{Path, PathBuf};

use mlproject::PipelineConfig;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Write a student-scores CSV whose `math_score` is a noisy linear function
/// of the other columns.
pub fn write_students(path: &Path, rows: usize, seed: u64) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer
        .write_record(["gender", "lunch", "math_score", "reading_score", "writing_score"])
        .unwrap();
    for _ in 0..rows {
        let male = rng.gen_bool(0.5);
        let standard = rng.gen_bool(0.6);
        let reading: f64 = rng.gen_range(30.0..100.0);
        let writing = reading + rng.gen_range(-8.0..8.0);
        let math = 0.8 * reading
            + if male { 6.0 } else { -2.0 }
            + if standard { 5.0 } else { 0.0 }
            + rng.gen_range(-3.0..3.0);
        writer
            .write_record([
                if male { "male" } else { "female" }.to_string(),
                if standard { "standard" } else { "free/reduced" }.to_string(),
                format!("{math:.1}"),
                format!("{reading:.1}"),
                format!("{writing:.1}"),
            ])
            .unwrap();
    }
    writer.flush().unwrap();
}

/// A project rooted at `root` with `rows` synthetic students at the default
/// source location.
pub fn project(root: &Path, rows: usize) -> PipelineConfig {
    let config = PipelineConfig::with_root(root);
    write_students(&config.source_path(), rows, 7);
    config
}

pub fn count_rows(path: &PathBuf) -> usize {
    mlproject::data::loader::load_file(path).unwrap().len()
}
