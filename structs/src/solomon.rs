use std::path::Path;

use thiserror::Error;

use crate::{Instance, Node, Point};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read instance file: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing {0} section")]
    MissingSection(&'static str),
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Reads and parses a Solomon-format file, see [`parse_truncated`].
pub fn from_file(path: impl AsRef<Path>, max_customers: Option<usize>) -> Result<Instance, ParseError> {
    let content = std::fs::read_to_string(path)?;
    parse_truncated(&content, max_customers)
}

pub fn parse(content: &str) -> Result<Instance, ParseError> {
    parse_truncated(content, None)
}

/// Parses a Solomon-format instance, keeping only the first `max_customers`
/// customers when given.
pub fn parse_truncated(content: &str, max_customers: Option<usize>) -> Result<Instance, ParseError> {
    let mut lines = content.lines().enumerate();

    let name = lines
        .by_ref()
        .map(|(_, l)| l.trim())
        .find(|l| !l.is_empty())
        .ok_or(ParseError::MissingSection("name"))?
        .to_string();

    // VEHICLE, then the "NUMBER CAPACITY" header, then the values.
    lines
        .by_ref()
        .find(|(_, l)| l.trim().starts_with("VEHICLE"))
        .ok_or(ParseError::MissingSection("VEHICLE"))?;
    let (num_vehicles, capacity) = {
        let (line_idx, line) = lines
            .by_ref()
            .find(|(_, l)| l.split_whitespace().next().is_some_and(|t| t.parse::<f64>().is_ok()))
            .ok_or(ParseError::MissingSection("VEHICLE"))?;
        let fields = numbers(line_idx, line)?;
        if fields.len() < 2 {
            return Err(ParseError::Malformed {
                line: line_idx + 1,
                reason: "expected vehicle number and capacity".to_string(),
            });
        }
        (fields[0] as usize, fields[1])
    };

    lines
        .by_ref()
        .find(|(_, l)| l.trim().starts_with("CUSTOMER"))
        .ok_or(ParseError::MissingSection("CUSTOMER"))?;

    let mut nodes = Vec::new();
    for (line_idx, line) in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() || !trimmed.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }

        let fields = numbers(line_idx, trimmed)?;
        if fields.len() != 7 {
            return Err(ParseError::Malformed {
                line: line_idx + 1,
                reason: format!("expected 7 fields, found {}", fields.len()),
            });
        }
        nodes.push(Node {
            id: fields[0] as usize,
            pos: Point::new(fields[1], fields[2]),
            demand: fields[3],
            ready: fields[4],
            due: fields[5],
            service: fields[6],
        });

        if max_customers.is_some_and(|m| nodes.len() > m) {
            break;
        }
    }

    if nodes.is_empty() {
        return Err(ParseError::MissingSection("CUSTOMER"));
    }

    Ok(Instance::euclidean(&name, capacity, num_vehicles, nodes))
}

fn numbers(line_idx: usize, line: &str) -> Result<Vec<f64>, ParseError> {
    line.split_whitespace()
        .map(|t| {
            t.parse::<f64>().map_err(|e| ParseError::Malformed {
                line: line_idx + 1,
                reason: format!("{:?}: {}", t, e),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const C_TINY: &str = "C_TINY

VEHICLE
NUMBER     CAPACITY
  3         200

CUSTOMER
CUST NO.  XCOORD.   YCOORD.    DEMAND   READY TIME  DUE DATE   SERVICE   TIME

    0      40         50          0          0       1236          0
    1      45         68         10        912        967         90
    2      45         70         30        825        870         90
    3      42         66         10         65        146         90
";

    #[test]
    fn test_parse_solomon() {
        let inst = parse(C_TINY).unwrap();
        assert_eq!(inst.name, "C_TINY");
        assert_eq!(inst.max_vehicles, 3);
        assert_eq!(inst.capacity, 200.0);
        assert_eq!(inst.nodes.len(), 4);
        assert_eq!(inst.nodes[2].demand, 30.0);
        assert_eq!(inst.nodes[3].ready, 65.0);
        assert_eq!(inst.nodes[1].service, 90.0);
        assert_eq!(inst.depot().due, 1236.0);
        assert_eq!(inst.cost.len(), 4);
        assert!(inst.validate().is_ok());
    }

    #[test]
    fn test_parse_truncated() {
        let inst = parse_truncated(C_TINY, Some(2)).unwrap();
        assert_eq!(inst.nodes.len(), 3);
        assert_eq!(inst.num_customers(), 2);
    }

    #[test]
    fn test_malformed_row_is_an_error() {
        let broken = C_TINY
            .lines()
            .map(|l| if l.trim_start().starts_with("2 ") { "    2      45  x" } else { l })
            .collect::<Vec<_>>()
            .join("\n");
        match parse(&broken) {
            Err(ParseError::Malformed { line, .. }) => assert_eq!(line, 12),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_sections() {
        assert!(matches!(parse(""), Err(ParseError::MissingSection("name"))));
        assert!(matches!(
            parse("NAME\nVEHICLE\nNUMBER CAPACITY\n1 10\n"),
            Err(ParseError::MissingSection("CUSTOMER"))
        ));
    }
}
