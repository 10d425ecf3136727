//! Pretty formatting of matrices and vectors. Used when logging the
//! contents of a factor or a message.

use std::fmt::Write;

use super::{Float, Matrix, Vector};

const PRECISION: usize = 3;
/// Values with more integral digits than this are written in scientific
/// notation
const INTEGRAL_DIGITS_LIMIT: usize = 9;

const BAR: char = '│';
const UPPER_LEFT_CORNER: char = '╭';
const UPPER_RIGHT_CORNER: char = '╮';
const LOWER_LEFT_CORNER: char = '╰';
const LOWER_RIGHT_CORNER: char = '╯';

/// Count the number of integral digits in a floating point number.
/// Useful for determining the width of the cell when pretty printing a matrix.
/// ```
/// use gbp_linalg::pretty_print::num_of_integral_digits;
/// assert_eq!(num_of_integral_digits(0.0), Some(1));
/// assert_eq!(num_of_integral_digits(1.0), Some(1));
/// assert_eq!(num_of_integral_digits(10.0), Some(2));
/// assert_eq!(num_of_integral_digits(-100.0), Some(4));
/// assert_eq!(num_of_integral_digits(1e-5), Some(1));
/// assert_eq!(num_of_integral_digits(f64::NAN), None);
/// assert_eq!(num_of_integral_digits(f64::INFINITY), None);
/// ```
#[must_use]
pub fn num_of_integral_digits(mut f: Float) -> Option<usize> {
    if f.is_nan() || f.is_infinite() {
        return None;
    }

    let mut count = 0_usize;

    if f.is_sign_negative() {
        f = -f;
        count += 1;
    }

    if f < 1.0 {
        count += 1;
    }

    while f >= 1.0 {
        f /= 10.0;
        count += 1;
    }

    Some(count)
}

fn cell_width<'a>(values: impl Iterator<Item = &'a Float>) -> usize {
    let max_width = values
        .map(|&x| num_of_integral_digits(x).unwrap_or(0) + 1)
        .max()
        .unwrap_or(0)
        // enough for "nan", "inf" and "-inf"
        .max(5)
        .min(INTEGRAL_DIGITS_LIMIT);
    max_width + 1 + PRECISION
}

fn write_cell(out: &mut String, x: Float, width: usize) {
    let precision = PRECISION;
    // Writing into a `String` cannot fail
    let _ = if x.abs() > 1e6 {
        write!(out, "{x:width$.precision$e}")
    } else {
        write!(out, "{x:width$.precision$}")
    };
}

fn write_top_border(out: &mut String, name: Option<&str>, dims: &str, total_width: usize) {
    match name {
        Some(name) if name.chars().count() + dims.len() <= total_width => {
            let fill = "─".repeat(total_width - name.chars().count() - dims.len());
            let _ = writeln!(out, "{UPPER_LEFT_CORNER}{name}{fill}{dims}{UPPER_RIGHT_CORNER}");
        }
        Some(name) => {
            let _ = writeln!(out, "{name}:{dims}");
            let _ = writeln!(
                out,
                "{UPPER_LEFT_CORNER}{}{UPPER_RIGHT_CORNER}",
                "─".repeat(total_width)
            );
        }
        None => {
            let _ = writeln!(
                out,
                "{UPPER_LEFT_CORNER}{}{UPPER_RIGHT_CORNER}",
                "─".repeat(total_width)
            );
        }
    }
}

/// Format a matrix inside a box with its name and shape in the top border.
///
/// ```
/// use gbp_linalg::pretty_print::pretty_format_matrix;
/// use ndarray::array;
/// let s = pretty_format_matrix(&array![[1.0, 0.0], [0.0, 1.0]], Some("eye"));
/// assert!(s.starts_with("╭eye"));
/// assert!(s.contains("2x2"));
/// assert_eq!(s.lines().count(), 4);
/// ```
#[must_use]
pub fn pretty_format_matrix(matrix: &Matrix<Float>, name: Option<&str>) -> String {
    let (nrows, ncols) = matrix.dim();
    let width = cell_width(matrix.iter());
    let right_padding = width / 2;
    let total_width = ncols * width + right_padding;
    let dims = format!("{nrows}x{ncols}");

    let mut out = String::new();
    write_top_border(&mut out, name, &dims, total_width);
    for row in matrix.rows() {
        out.push(BAR);
        for &x in row {
            write_cell(&mut out, x, width);
        }
        let _ = writeln!(out, "{}{BAR}", " ".repeat(right_padding));
    }
    let _ = writeln!(
        out,
        "{LOWER_LEFT_CORNER}{}{LOWER_RIGHT_CORNER}",
        "─".repeat(total_width)
    );
    out
}

/// Format a vector as a single boxed row with its name and length in the top
/// border.
#[must_use]
pub fn pretty_format_vector(vector: &Vector<Float>, name: Option<&str>) -> String {
    let width = cell_width(vector.iter());
    let right_padding = width / 2;
    let total_width = vector.len() * width + right_padding;
    let dims = format!("{}x1", vector.len());

    let mut out = String::new();
    write_top_border(&mut out, name, &dims, total_width);
    out.push(BAR);
    for &x in vector {
        write_cell(&mut out, x, width);
    }
    let _ = writeln!(out, "{}{BAR}", " ".repeat(right_padding));
    let _ = writeln!(
        out,
        "{LOWER_LEFT_CORNER}{}{LOWER_RIGHT_CORNER}",
        "─".repeat(total_width)
    );
    out
}
