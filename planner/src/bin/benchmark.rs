use std::error::Error;
use std::fs::read_dir;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use vrptw_planner::{
    colgen::{ColumnGeneration, VehicleBounds},
    extsolvers::highs::HighsSolverInstance,
    PricingMode, SolverConfig,
};
use vrptw_structs::solomon;

const MODES: [PricingMode; 3] = [PricingMode::Exact, PricingMode::Dssr, PricingMode::Ssr];

#[derive(Debug, Serialize)]
struct BenchRecord {
    instance: String,
    customers: usize,
    mode: String,
    time: f64,
    objective: Option<f64>,
    vehicles: Option<f64>,
    iterations: Option<usize>,
    columns: Option<usize>,
    error: Option<String>,
}

fn get_instance_files(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let mut filenames = Vec::new();
    for entry in read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("txt")) {
            filenames.push(path);
        }
    }
    filenames.sort();
    Ok(filenames)
}

fn usage() -> ! {
    eprintln!("usage: benchmark <dir> [customers]");
    std::process::exit(2)
}

pub fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let dir = args.next().unwrap_or_else(|| usage());
    let max_customers = match args.next() {
        Some(n) => Some(n.parse::<usize>()?),
        None => None,
    };

    println!("--------------------------");
    println!("vrptw pricing benchmarking");
    println!("--------------------------");
    println!();
    println!(
        "  modes: {}",
        MODES.iter().map(|m| m.to_string()).collect::<Vec<_>>().join(", ")
    );
    println!();

    let instance_files = get_instance_files(Path::new(&dir))?;
    let mut records: Vec<BenchRecord> = Vec::new();

    println!("# RUNNING {} INSTANCES", instance_files.len());
    for filename in instance_files.iter() {
        #[cfg(feature = "prof")]
        let _p = hprof::enter("instance");
        let instance = {
            #[cfg(feature = "prof")]
            let _p = hprof::enter("read");
            solomon::from_file(filename, max_customers)?
        };
        println!(
            " * instance {} with {} customers",
            filename.display(),
            instance.num_customers()
        );

        for mode in MODES {
            println!("   - pricing with: \"{}\"", mode);
            let mut config = SolverConfig::default();
            config.pricing.mode = mode;

            let t0 = Instant::now();
            let result = ColumnGeneration::<HighsSolverInstance>::new(&instance, &config)
                .and_then(|mut colgen| colgen.run(VehicleBounds::root(&instance)));
            let time = t0.elapsed().as_secs_f64();

            let mut record = BenchRecord {
                instance: instance.name.clone(),
                customers: instance.num_customers(),
                mode: mode.to_string(),
                time,
                objective: None,
                vehicles: None,
                iterations: None,
                columns: None,
                error: None,
            };
            match result {
                Ok(solution) => {
                    record.objective = Some(solution.objective);
                    record.vehicles = Some(solution.vehicles);
                    record.iterations = Some(solution.iterations);
                    record.columns = Some(solution.columns);
                }
                Err(err) => {
                    println!("     failed: {}", err);
                    record.error = Some(err.to_string());
                }
            }
            records.push(record);
        }
    }
    println!();

    #[cfg(feature = "prof")]
    {
        println!("# PROFILER");
        hprof::profiler().print_timing();
        println!();
    }

    println!("# RESULTS");

    let mut tablewriter = tabwriter::TabWriter::new(Vec::new());
    write!(&mut tablewriter, "instance\tcust")?;
    for mode in MODES {
        write!(&mut tablewriter, "\t|\t{}\t\t\t\t", mode)?;
    }
    writeln!(&mut tablewriter)?;

    write!(&mut tablewriter, "\t")?;
    for _ in MODES {
        write!(&mut tablewriter, "\t|\ttime\tobj\tveh\titer\tcols")?;
    }
    writeln!(&mut tablewriter)?;

    write!(&mut tablewriter, "---\t---")?;
    for _ in MODES {
        write!(&mut tablewriter, "\t\t---\t---\t---\t---\t---")?;
    }
    writeln!(&mut tablewriter)?;

    for row in records.chunks(MODES.len()) {
        write!(&mut tablewriter, "{}\t{}", row[0].instance, row[0].customers)?;
        for r in row {
            match (r.objective, r.vehicles, r.iterations, r.columns) {
                (Some(obj), Some(veh), Some(iter), Some(cols)) => write!(
                    &mut tablewriter,
                    "\t|\t{:.2}\t{:.2}\t{:.2}\t{}\t{}",
                    r.time, obj, veh, iter, cols
                )?,
                _ => write!(&mut tablewriter, "\t|\t{:.2}\tfail\t-\t-\t-", r.time)?,
            }
        }
        writeln!(&mut tablewriter)?;
    }

    let written = String::from_utf8(
        tablewriter
            .into_inner()
            .map_err(|_| "could not flush the results table")?,
    )?;
    println!("{}", written);

    let mut csv = csv::Writer::from_path("bench_results.csv")?;
    for r in records.iter() {
        csv.serialize(r)?;
    }
    csv.flush()?;
    println!("wrote bench_results.csv");
    Ok(())
}
