use std::io::Write;

use tabwriter::TabWriter;
use vrptw_structs::{Instance, Solution};

pub fn solution_table(instance: &Instance, solution: &Solution) -> anyhow::Result<String> {
    let mut tw = TabWriter::new(Vec::new());
    writeln!(&mut tw, "route\tvalue\tcost\tload\tpath")?;
    writeln!(&mut tw, "---\t---\t---\t---\t---")?;
    for (i, r) in solution.routes.iter().enumerate() {
        let path = r
            .route
            .path
            .iter()
            .map(|c| instance.nodes[*c].id.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(
            &mut tw,
            "{}\t{:.3}\t{:.2}\t{}\t0 {} 0",
            i,
            r.value,
            r.route.cost,
            r.route.load(instance),
            path
        )?;
    }
    writeln!(&mut tw)?;
    writeln!(&mut tw, "instance\t{}", solution.instance)?;
    writeln!(&mut tw, "vehicles\t{:.3}", solution.vehicles)?;
    writeln!(&mut tw, "total cost\t{:.3}", solution.objective)?;
    writeln!(
        &mut tw,
        "integral\t{}",
        if solution.is_integral(1e-6) { "yes" } else { "no" }
    )?;

    let bytes = tw
        .into_inner()
        .map_err(|_| anyhow::anyhow!("could not flush the solution table"))?;
    Ok(String::from_utf8(bytes)?)
}
