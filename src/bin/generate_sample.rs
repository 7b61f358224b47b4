use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

/// Write synthetic .plt sweeps and .csv profiles for trying out the engine.
#[derive(Parser, Debug)]
struct Args {
    /// Output directory, created if missing
    #[arg(default_value = "sample_data")]
    out_dir: PathBuf,
    /// Points per file
    #[arg(long, default_value_t = 200)]
    points: usize,
}

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Deterministic normal noise (splitmix64 + Box-Muller).
struct Noise(u64);

impl Noise {
    fn uniform(&mut self) -> f64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        ((z ^ (z >> 31)) >> 11) as f64 / (1u64 << 53) as f64
    }

    fn gauss(&mut self, std_dev: f64) -> f64 {
        let u1 = self.uniform().max(1e-15);
        let u2 = self.uniform();
        std_dev * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

/// Diode-like voltage sweep in the plt layout.
fn write_sweep(path: &Path, points: usize, saturation: f64, noise: &mut Noise) -> Result<()> {
    let mut text = String::new();
    writeln!(text, "DF-ISE text\n")?;
    writeln!(text, "Info {{")?;
    writeln!(text, "  version   = 1.0")?;
    writeln!(text, "  type      = xyplot")?;
    writeln!(text, "  datasets  = [")?;
    writeln!(text, "    \"time\" \"anode OuterVoltage\"")?;
    writeln!(text, "    \"anode TotalCurrent\" ]")?;
    writeln!(text, "  functions = [")?;
    writeln!(text, "    time OuterVoltage TotalCurrent ]")?;
    writeln!(text, "}}\n")?;
    writeln!(text, "Data {{")?;

    for i in 0..points {
        let t = i as f64 / points as f64;
        let v = 0.8 * t;
        let current = saturation * ((v / 0.0259).exp() - 1.0) + noise.gauss(saturation);
        writeln!(text, "  {t:.6e} {v:.6e} {current:.6e}")?;
    }
    writeln!(text, "}}")?;

    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

/// Field profile along a cut line; `arc_length` in centimetres.
fn write_profile(path: &Path, points: usize, peak_at: f64, noise: &mut Noise) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["arc_length", "ElectricField", "Potential"])?;

    for i in 0..points {
        // 0 .. 10 µm expressed in cm
        let s = i as f64 * 1.0e-3 / points as f64;
        let field = gaussian(s, peak_at, 1.0e-4, 3.0e5) + noise.gauss(1.0e3);
        let potential = 1.0 - s / 1.0e-3;
        writer.write_record(&[s.to_string(), field.to_string(), potential.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut noise = Noise(42);

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    let sweeps = [("diode_a.plt", 1.0e-12), ("diode_b.plt", 4.0e-12), ("diode_c.plt", 2.0e-11)];
    for (name, saturation) in sweeps {
        write_sweep(&args.out_dir.join(name), args.points, saturation, &mut noise)?;
    }

    let profiles = [("cut_1.csv", 2.0e-4), ("cut_2.csv", 5.0e-4)];
    for (name, peak_at) in profiles {
        write_profile(&args.out_dir.join(name), args.points, peak_at, &mut noise)?;
    }

    println!(
        "Wrote {} plt and {} csv files ({} points each) to {}",
        sweeps.len(),
        profiles.len(),
        args.points,
        args.out_dir.display()
    );
    Ok(())
}
