use std::fmt;

use hive_kernel_stream::{as_byte_stream, create_pipe, dev_null, ByteStream, PipeEnd, SharedStream};

/// Streams a tenant starts with. Unset streams default to `dev_null`.
#[derive(Clone, Default)]
pub struct StdioOptions {
    pub stdin: Option<SharedStream>,
    pub stdout: Option<SharedStream>,
    pub stderr: Option<SharedStream>,
}

impl StdioOptions {
    pub fn stdin(mut self, stream: SharedStream) -> Self {
        self.stdin = Some(stream);
        self
    }

    pub fn stdout(mut self, stream: SharedStream) -> Self {
        self.stdout = Some(stream);
        self
    }

    pub fn stderr(mut self, stream: SharedStream) -> Self {
        self.stderr = Some(stream);
        self
    }
}

/// A tenant's standard streams.
#[derive(Clone)]
pub struct Stdio {
    pub stdin: SharedStream,
    pub stdout: SharedStream,
    pub stderr: SharedStream,
}

/// Host-side ends of a [`Stdio::piped`] set.
///
/// The host writes into `stdin` and reads from `stdout`/`stderr`.
#[derive(Clone)]
pub struct HostStdio {
    pub stdin: PipeEnd,
    pub stdout: PipeEnd,
    pub stderr: PipeEnd,
}

impl Stdio {
    pub fn from_options(options: StdioOptions) -> Self {
        Self {
            stdin: options.stdin.unwrap_or_else(|| as_byte_stream(dev_null())),
            stdout: options.stdout.unwrap_or_else(|| as_byte_stream(dev_null())),
            stderr: options.stderr.unwrap_or_else(|| as_byte_stream(dev_null())),
        }
    }

    /// All three streams discard output and read end-of-stream.
    pub fn null() -> Self {
        Self::from_options(StdioOptions::default())
    }

    /// Three fresh pipes: the tenant side as [`StdioOptions`], plus the host side.
    pub fn piped(high_water_mark: usize) -> (StdioOptions, HostStdio) {
        let (stdin_r, stdin_w) = create_pipe(high_water_mark);
        let (stdout_r, stdout_w) = create_pipe(high_water_mark);
        let (stderr_r, stderr_w) = create_pipe(high_water_mark);
        let tenant = StdioOptions {
            stdin: Some(as_byte_stream(stdin_r)),
            stdout: Some(as_byte_stream(stdout_w)),
            stderr: Some(as_byte_stream(stderr_w)),
        };
        let host = HostStdio {
            stdin: stdin_w,
            stdout: stdout_r,
            stderr: stderr_r,
        };
        (tenant, host)
    }

    /// Close all three streams.
    pub fn close(&self) {
        self.stdin.close();
        self.stdout.close();
        self.stderr.close();
    }
}

impl Default for Stdio {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for Stdio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stdio")
            .field("stdin_closed", &self.stdin.is_closed())
            .field("stdout_closed", &self.stdout.is_closed())
            .field("stderr_closed", &self.stderr.is_closed())
            .finish()
    }
}

impl fmt::Debug for StdioOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdioOptions")
            .field("stdin", &self.stdin.is_some())
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .finish()
    }
}
