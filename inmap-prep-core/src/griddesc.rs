//! IOAPI `GRIDDESC` grid registry
//!
//! A GRIDDESC file has two segments, each terminated by a `' '` line. The first
//! defines named coordinate systems:
//!
//! ```text
//! 'LAM_40N97W'
//!   2  33.000  45.000  -97.000  -97.000  40.000
//! ```
//!
//! with `GDTYP P_ALP P_BET P_GAM XCENT YCENT`. The second defines grids on those
//! coordinate systems:
//!
//! ```text
//! '12US1'
//! 'LAM_40N97W'  -2556000.0  -1728000.0  12000.0  12000.0  459  299  1
//! ```
//!
//! with `XORIG YORIG XCELL YCELL NCOLS NROWS NTHIK`.

use crate::errors::{InmapError, InmapResult};
use crate::grid::{GridDescriptor, Projection, ProjectionParameters};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
struct CoordinateSystem {
    name: String,
    projection: Projection,
    parameters: ProjectionParameters,
}

/// Grids parsed from a GRIDDESC file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridRegistry {
    coordinate_systems: Vec<CoordinateSystem>,
    grids: Vec<GridDescriptor>,
}

#[derive(Debug, PartialEq)]
enum Token {
    Quoted(String),
    Bare(String),
}

/// Split a line into quoted and bare tokens, treating commas as whitespace
///
/// An unquoted `!` starts a comment running to the end of the line.
fn tokenize(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c == '!' {
            break;
        } else if c.is_whitespace() || c == ',' {
            chars.next();
        } else if c == '\'' || c == '"' {
            chars.next();
            let quoted: String = chars.by_ref().take_while(|&q| q != c).collect();
            tokens.push(Token::Quoted(quoted.trim().to_string()));
        } else {
            let mut bare = String::new();
            while let Some(&b) = chars.peek() {
                if b.is_whitespace() || b == ',' || b == '!' {
                    break;
                }
                bare.push(b);
                chars.next();
            }
            tokens.push(Token::Bare(bare));
        }
    }
    tokens
}

fn parse_number(token: &Token, line: usize) -> InmapResult<f64> {
    let text = match token {
        Token::Bare(t) => t.replace(&['D', 'd'][..], "E"),
        Token::Quoted(t) => {
            return Err(InmapError::GridDescription {
                line,
                message: format!("expected a number, found '{}'", t),
            })
        }
    };
    text.parse::<f64>().map_err(|_| InmapError::GridDescription {
        line,
        message: format!("invalid number {}", text),
    })
}

fn parse_count(token: &Token, line: usize) -> InmapResult<usize> {
    let value = parse_number(token, line)?;
    if value < 0.0 || value.fract() != 0.0 {
        return Err(InmapError::GridDescription {
            line,
            message: format!("expected a non-negative whole number, found {}", value),
        });
    }
    Ok(value as usize)
}

/// A line holding a single quoted name, which is empty for segment terminators
fn quoted_name(tokens: &[Token]) -> Option<&str> {
    match tokens {
        [Token::Quoted(name)] => Some(name.as_str()),
        _ => None,
    }
}

#[derive(PartialEq)]
enum Segment {
    CoordinateSystems,
    Grids,
}

impl GridRegistry {
    /// Parse the contents of a GRIDDESC file
    pub fn parse(contents: &str) -> InmapResult<Self> {
        let mut registry = GridRegistry::default();
        let mut segment = Segment::CoordinateSystems;
        let mut pending: Option<(String, usize)> = None;

        for (index, raw) in contents.lines().enumerate() {
            let line = index + 1;
            let tokens = tokenize(raw);
            if tokens.is_empty() {
                continue;
            }

            if let Some((name, name_line)) = pending.take() {
                match segment {
                    Segment::CoordinateSystems => {
                        registry.push_coordinate_system(name, &tokens, line)?
                    }
                    Segment::Grids => registry.push_grid(name, &tokens, line)?,
                }
                debug!(line = name_line, "parsed GRIDDESC entry");
                continue;
            }

            match quoted_name(&tokens) {
                // Leading header line before any coordinate system
                Some("")
                    if segment == Segment::CoordinateSystems
                        && registry.coordinate_systems.is_empty() =>
                {
                    continue
                }
                Some("") if segment == Segment::CoordinateSystems => segment = Segment::Grids,
                Some("") => break,
                Some(name) => pending = Some((name.to_string(), line)),
                None => {
                    return Err(InmapError::GridDescription {
                        line,
                        message: "expected a quoted name".into(),
                    })
                }
            }
        }

        if let Some((name, line)) = pending {
            return Err(InmapError::GridDescription {
                line,
                message: format!("missing definition for '{}'", name),
            });
        }
        Ok(registry)
    }

    pub fn from_path(path: impl AsRef<Path>) -> InmapResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    fn push_coordinate_system(
        &mut self,
        name: String,
        tokens: &[Token],
        line: usize,
    ) -> InmapResult<()> {
        if tokens.len() < 6 {
            return Err(InmapError::GridDescription {
                line,
                message: format!(
                    "coordinate system '{}' needs GDTYP P_ALP P_BET P_GAM XCENT YCENT",
                    name
                ),
            });
        }
        let code = parse_number(&tokens[0], line)?;
        let projection = Projection::from_ioapi_code(code as i64)?;
        let v = tokens[1..6]
            .iter()
            .map(|t| parse_number(t, line))
            .collect::<InmapResult<Vec<f64>>>()?;

        self.coordinate_systems.push(CoordinateSystem {
            name,
            projection,
            parameters: ProjectionParameters::new(v[0], v[1], v[2], v[3], v[4]),
        });
        Ok(())
    }

    fn push_grid(&mut self, name: String, tokens: &[Token], line: usize) -> InmapResult<()> {
        let coordinate_name = match tokens.first() {
            Some(Token::Quoted(c)) if tokens.len() >= 8 => c,
            _ => {
                return Err(InmapError::GridDescription {
                    line,
                    message: format!(
                        "grid '{}' needs 'COORD' XORIG YORIG XCELL YCELL NCOLS NROWS NTHIK",
                        name
                    ),
                })
            }
        };
        let coordinates = self
            .coordinate_systems
            .iter()
            .find(|c| &c.name == coordinate_name)
            .ok_or_else(|| InmapError::GridDescription {
                line,
                message: format!("unknown coordinate system '{}'", coordinate_name),
            })?;

        let x_orig = parse_number(&tokens[1], line)?;
        let y_orig = parse_number(&tokens[2], line)?;
        let x_cell = parse_number(&tokens[3], line)?;
        let y_cell = parse_number(&tokens[4], line)?;
        let columns = parse_count(&tokens[5], line)?;
        let rows = parse_count(&tokens[6], line)?;
        let thickness = parse_count(&tokens[7], line)?;

        let grid = GridDescriptor::new(
            &name,
            coordinates.projection,
            coordinates.parameters,
            (x_orig, y_orig),
            (x_cell, y_cell),
            columns,
            rows,
        )
        .with_boundary_thickness(thickness);
        self.grids.push(grid);
        Ok(())
    }

    /// Look up a grid by name
    pub fn get(&self, name: &str) -> InmapResult<&GridDescriptor> {
        self.grids
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| InmapError::GridNotFound(name.to_string()))
    }

    pub fn grid_names(&self) -> Vec<&str> {
        self.grids.iter().map(|g| g.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    const GRIDDESC: &str = "' '
'LAM_40N97W'
  2        33.000        45.000       -97.000       -97.000        40.000
'POLAR_HEMI'
  6         1.000        45.000       -98.000       -98.000        90.000
' '
'12US1'
'LAM_40N97W'  -2556000.000  -1728000.000  12000.000  12000.000  459  299    1
'108NHEMI2'
'POLAR_HEMI'  -10098000.0D0 -10098000.0D0 108000.0D0 108000.0D0 187 187 1
' '
";

    #[test]
    fn parse_registry() {
        let registry = GridRegistry::parse(GRIDDESC).unwrap();
        assert_eq!(registry.grid_names(), vec!["12US1", "108NHEMI2"]);

        let us = registry.get("12US1").unwrap();
        assert_eq!(us.projection, Projection::LambertConformal);
        assert_eq!(us.origin, (-2556000.0, -1728000.0));
        assert_eq!(us.cell_size, (12000.0, 12000.0));
        assert_eq!((us.columns, us.rows), (459, 299));
        assert_eq!(us.parameters.y_center, 40.0);

        let hemi = registry.get("108NHEMI2").unwrap();
        assert_eq!(hemi.projection, Projection::PolarStereographic);
        assert_eq!(hemi.cell_size.0, 108000.0);
    }

    #[test]
    fn unknown_grid() {
        let registry = GridRegistry::parse(GRIDDESC).unwrap();
        assert!(matches!(
            registry.get("36US3"),
            Err(InmapError::GridNotFound(name)) if name == "36US3"
        ));
    }

    #[test]
    fn unknown_coordinate_system() {
        let text = "' '\n'A'\n2 33 45 -97 -97 40\n' '\n'G'\n'B' 0 0 1 1 2 2 1\n' '\n";
        assert!(matches!(
            GridRegistry::parse(text),
            Err(InmapError::GridDescription { line: 6, .. })
        ));
    }

    #[test]
    fn truncated_definition() {
        let text = "' '\n'A'\n2 33 45\n";
        assert!(matches!(
            GridRegistry::parse(text),
            Err(InmapError::GridDescription { line: 3, .. })
        ));

        let dangling = "' '\n'A'\n";
        assert!(GridRegistry::parse(dangling).is_err());
    }

    #[test]
    fn tokens() {
        assert_eq!(
            tokenize("'LAM', 2.5 3"),
            vec![
                Token::Quoted("LAM".into()),
                Token::Bare("2.5".into()),
                Token::Bare("3".into())
            ]
        );
        assert_eq!(tokenize("' '"), vec![Token::Quoted("".into())]);
        assert_eq!(
            tokenize("' '    !  end coords.  grids: name; xorig, yorig"),
            vec![Token::Quoted("".into())]
        );
        assert_eq!(
            tokenize("'A!B' 40.0! center"),
            vec![Token::Quoted("A!B".into()), Token::Bare("40.0".into())]
        );
        assert!(tokenize("! whole line comment").is_empty());
    }

    #[test]
    fn ioapi_comment_lines() {
        let text = "' '    !  coords --line:  name; type,  P-alpha, P-beta, P-gamma, xcent, ycent
'LAM_40N97W'
  2        33.000        45.000       -97.000       -97.000        40.000
' '    !  end coords.  grids:  name; xorig, yorig, xcell, ycell, ncols, nrows, nthik
'12US1'
'LAM_40N97W'  -2556000.000  -1728000.000  12000.000  12000.000  459  299    1
' '    !  end grids.
";
        let registry = GridRegistry::parse(text).unwrap();
        assert_eq!(registry.grid_names(), vec!["12US1"]);
        let us = registry.get("12US1").unwrap();
        assert!(is_close!(us.origin.0, -2556000.0));
        assert_eq!((us.columns, us.rows), (459, 299));
    }
}
