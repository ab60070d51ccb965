//! Nodes and links files.
//!
//! Both start with a free-text line and a line holding the record count
//! and the scale factors, followed by one record per line:
//!
//! * nodes: `userID x y [description]`
//! * links: `id from to length ffs signalID grade curvature directions
//!   speedVariation hasCatenary [region]`

use regex::Regex;

use super::ParseError;
use super::records::{LinkRecord, NodeRecord};

const NODES: &str = "nodes";
const LINKS: &str = "links";

fn num<T: std::str::FromStr>(s: &str, file: &'static str, line: usize) -> Result<T, ParseError> {
    s.parse::<T>().map_err(|_e| ParseError::NumberError(file, line))
}

/// Data lines with their 1-based line number, after the two header lines.
fn body<'a>(input: &'a str, file: &'static str) -> Result<(&'a str, Vec<(usize, &'a str)>), ParseError> {
    let mut lines = input.lines().enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty());
    lines.next().ok_or(ParseError::MissingHeader(file))?;
    let (_, scales) = lines.next().ok_or(ParseError::MissingHeader(file))?;
    Ok((scales, lines.collect()))
}

/// Scale factors after the record count; missing ones default to 1.
fn scales(line: &str, n: usize, file: &'static str, lineno: usize) -> Result<Vec<f64>, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    (0..n).map(|i| match fields.get(i + 1) {
        Some(s) => num(s, file, lineno),
        None => Ok(1.0),
    }).collect()
}

pub fn parse_nodes(input: &str) -> Result<Vec<NodeRecord>, ParseError> {
    let node_re = Regex::new(r"^\s*(-?\d+)\s+([-+\d\.eE]+)\s+([-+\d\.eE]+)\s*(.*?)\s*$")
        .map_err(|e| ParseError::RegexError(format!("{:?}", e)))?;
    let (scale_line, lines) = body(input, NODES)?;
    let s = scales(scale_line, 2, NODES, 2)?;

    let mut nodes = Vec::new();
    for (lineno, line) in lines {
        let groups = node_re.captures(line)
            .ok_or_else(|| ParseError::Unrecognized(NODES, lineno, line.to_string()))?;
        nodes.push(NodeRecord {
            user_id: num(&groups[1], NODES, lineno)?,
            x: num(&groups[2], NODES, lineno)?,
            y: num(&groups[3], NODES, lineno)?,
            description: groups[4].to_string(),
            x_scale: s[0],
            y_scale: s[1],
        });
    }
    Ok(nodes)
}

pub fn parse_links(input: &str) -> Result<Vec<LinkRecord>, ParseError> {
    let link_re = Regex::new(r"(?x) ^ \s*
            (?P<id>-?\d+) \s+ (?P<from>-?\d+) \s+ (?P<to>-?\d+) \s+
            (?P<len>[-+\d\.eE]+) \s+ (?P<ffs>[-+\d\.eE]+) \s+
            (?P<signal>-?\d+) \s+ (?P<grade>[-+\d\.eE]+) \s+ (?P<curv>[-+\d\.eE]+) \s+
            (?P<dirs>\d+) \s+ (?P<var>[-+\d\.eE]+) \s+ (?P<cat>[01]) \s*
            (?P<region>.*?) \s* $")
        .map_err(|e| ParseError::RegexError(format!("{:?}", e)))?;
    let (scale_line, lines) = body(input, LINKS)?;
    let s = scales(scale_line, 2, LINKS, 2)?;

    let mut links = Vec::new();
    for (lineno, line) in lines {
        let g = link_re.captures(line)
            .ok_or_else(|| ParseError::Unrecognized(LINKS, lineno, line.to_string()))?;
        let region = g["region"].trim();
        links.push(LinkRecord {
            user_id: num(&g["id"], LINKS, lineno)?,
            from: num(&g["from"], LINKS, lineno)?,
            to: num(&g["to"], LINKS, lineno)?,
            length: num(&g["len"], LINKS, lineno)?,
            free_flow_speed: num(&g["ffs"], LINKS, lineno)?,
            signal_id: num(&g["signal"], LINKS, lineno)?,
            grade: num(&g["grade"], LINKS, lineno)?,
            curvature: num(&g["curv"], LINKS, lineno)?,
            directions: num(&g["dirs"], LINKS, lineno)?,
            speed_variation: num(&g["var"], LINKS, lineno)?,
            has_catenary: &g["cat"] == "1",
            region: if region.is_empty() { "ND Region".to_string() } else { region.to_string() },
            length_scale: s[0],
            speed_scale: s[1],
        });
    }
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_with_scales() {
        let text = "my network\n2 1000 1000\n1 0 0 start\n2 1.5 0\n";
        let nodes = parse_nodes(text).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].description, "start");
        assert_eq!(nodes[1].x, 1.5);
        assert_eq!(nodes[1].x_scale, 1000.0);
    }

    #[test]
    fn links_default_region() {
        let text = "links\n2 1 1\n1 1 2 100 20 0 0.001 0 2 0 1\n2 2 3 -1 20 10001 0 0 1 0 0 East\n";
        let links = parse_links(text).unwrap();
        assert_eq!(links.len(), 2);
        assert!(links[0].has_catenary);
        assert_eq!(links[0].region, "ND Region");
        assert_eq!(links[1].region, "East");
        assert_eq!(links[1].signal_id, 10001);
        assert_eq!(links[1].directions, 1);
    }

    #[test]
    fn malformed_line_names_file_and_line() {
        let err = parse_nodes("n\n1 1 1\nx y z\n").unwrap_err();
        match err {
            ParseError::Unrecognized(file, line, _) => {
                assert_eq!(file, "nodes");
                assert_eq!(line, 3);
            }
            e => panic!("unexpected error {}", e),
        }
        assert!(parse_links("only one line").is_err());
    }
}
