use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::Level;

/// Reference implementation of polynomial calibration, summing powers term by term, for
/// comparison to the Horner evaluation in `Calibration`.
///
/// Returns the value along with the sum of the magnitudes of its terms, which bounds the
/// rounding error of either evaluation.
///
pub(crate) fn polynomial(coefficients: &[f64], origin: f64, x: f64) -> (f64, f64) {
    let y = x - origin;
    let mut value = 0.0;
    let mut magnitude = 0.0;
    for (degree, coefficient) in coefficients.iter().enumerate() {
        let term = coefficient * y.powi(degree as i32);
        value += term;
        magnitude += term.abs();
    }

    (value, magnitude)
}

/// Run `f` with a subscriber that collects its warnings, and return them one line each.
///
pub(crate) fn warnings<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
    let log = LogBuffer::default();
    let writer = {
        let log = log.clone();
        move || log.clone()
    };
    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .without_time()
        .with_max_level(Level::WARN)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);

    let output = String::from_utf8_lossy(&log.0.lock()).into_owned();
    (result, output.lines().map(String::from).collect())
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
