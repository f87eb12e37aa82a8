use std::io::Write;

/// Terminal state of the deployer process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Success,
    Failure,
}

impl Termination {
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
        }
    }
}

/// Writes the full report of a failed run to `err_out`. This does not go
/// through the tracing subscriber, so `RUST_LOG` cannot hide it. Every kind
/// of failure ends the process the same way.
pub fn terminate<T>(
    result: eyre::Result<T>,
    err_out: &mut impl Write,
) -> Termination {
    match result {
        Ok(_) => Termination::Success,
        Err(report) => {
            tracing::error!("Deployment failed");

            // Nothing left to report to if stderr itself is gone
            let _ = writeln!(err_out, "Error: {report:?}");
            let _ = err_out.flush();

            Termination::Failure
        }
    }
}
