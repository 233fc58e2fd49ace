//! Terminal front panel.
//!
//! Four panes on one 80x30 screen: registers + PC down the left column,
//! the instruction trace on the right (17 lines, 52 columns, cycle count in
//! the header), then the event log (6 lines) and the UART output (6 lines)
//! across the bottom.
//!
//! The pane logger is the process-wide `log` backend: every record goes to
//! `events.log` and into the ring the log pane renders. Nothing in the
//! emulation core knows the screen exists.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Write};
use std::sync::{Mutex, OnceLock};

use crossterm::cursor::MoveTo;
use crossterm::style::{Color, Print, SetForegroundColor};
use crossterm::{queue, terminal};
use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::machine::Fe310;

/// Log pane height.
const LOG_SHOW: usize = 6;
/// Trace pane geometry.
const TRACE_SHOW: usize = 17;
const TRACE_WIDTH: usize = 52;
const TRACE_COL: u16 = 28;
/// UART pane geometry.
const UART_SHOW: usize = 6;
const UART_WIDTH: usize = 80;

const MIN_COLS: u16 = 80;
const MIN_ROWS: u16 = 30;

const BORDER: Color = Color::White;
const TEXT: Color = Color::Grey;

struct LoggerInner {
    file: Option<File>,
    lines: VecDeque<String>,
}

/// `log` backend feeding the log pane and `events.log`.
pub struct PaneLogger {
    inner: Mutex<LoggerInner>,
}

impl PaneLogger {
    fn new() -> Self {
        Self {
            inner: Mutex::new(LoggerInner {
                file: File::create("events.log").ok(),
                lines: VecDeque::new(),
            }),
        }
    }

    /// Install as the process logger. Records at `Info` and up are kept;
    /// the UART chatter at `Debug` stays out of the pane.
    pub fn install() -> &'static Self {
        static LOGGER: OnceLock<PaneLogger> = OnceLock::new();
        let logger = LOGGER.get_or_init(PaneLogger::new);
        let _ = log::set_logger(logger);
        log::set_max_level(LevelFilter::Info);
        logger
    }

    /// The most recent pane lines, oldest first.
    fn recent(&self, n: usize) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner
            .lines
            .iter()
            .skip(inner.lines.len().saturating_sub(n))
            .cloned()
            .collect()
    }

    /// Flush and close `events.log`.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(file) = &mut inner.file {
            let _ = file.flush();
        }
        inner.file = None;
    }
}

impl Log for PaneLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = record.args().to_string();
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(file) = &mut inner.file {
            let _ = writeln!(file, "{line}");
        }
        if inner.lines.len() == 64 {
            inner.lines.pop_front();
        }
        inner.lines.push_back(line);
    }

    fn flush(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(file) = &mut inner.file {
            let _ = file.flush();
        }
    }
}

/// The four-pane display.
pub struct Display {
    logger: &'static PaneLogger,
    trace_lines: VecDeque<String>,
    uart_lines: Vec<Vec<u8>>,
    uart_x: usize,
    uart_y: usize,
    rows: u16,
}

impl Display {
    /// Check the terminal and build the pane state. Fails (with a plain
    /// message for stderr) when the terminal is too small.
    pub fn new(logger: &'static PaneLogger) -> Result<Self, String> {
        let (cols, rows) =
            terminal::size().map_err(|e| format!("Unable to query terminal size: {e}"))?;
        if cols < MIN_COLS || rows < MIN_ROWS {
            return Err(format!(
                "Terminal must be at least {MIN_COLS}x{MIN_ROWS} - currently {cols} x {rows}"
            ));
        }
        Ok(Self {
            logger,
            trace_lines: VecDeque::new(),
            uart_lines: vec![vec![b' '; UART_WIDTH]; UART_SHOW],
            uart_x: 0,
            uart_y: 0,
            rows,
        })
    }

    /// Pull fresh trace lines and UART bytes out of the machine.
    pub fn absorb(&mut self, machine: &mut Fe310) {
        for line in machine.take_trace() {
            if self.trace_lines.len() == TRACE_SHOW {
                self.trace_lines.pop_front();
            }
            self.trace_lines.push_back(line);
        }
        for byte in machine.take_uart_output() {
            self.uart_write(byte);
        }
    }

    /// UART pane cursor semantics: printable characters advance, CR
    /// returns to column 0, LF (or running off the edge) scrolls.
    fn uart_write(&mut self, byte: u8) {
        if byte > 27 && byte < 127 {
            self.uart_lines[self.uart_y][self.uart_x] = byte;
            self.uart_x += 1;
        }
        if byte == b'\r' {
            self.uart_x = 0;
        }
        if byte == b'\n' || self.uart_x == UART_WIDTH {
            self.uart_y += 1;
            self.uart_x = 0;
            if self.uart_y == UART_SHOW {
                self.uart_lines.rotate_left(1);
                self.uart_lines[UART_SHOW - 1].fill(b' ');
                self.uart_y -= 1;
            }
        }
    }

    /// Repaint every pane.
    pub fn draw(&self, out: &mut impl Write, machine: &Fe310) -> io::Result<()> {
        let cpu = machine.cpu();

        // Register column.
        queue!(out, MoveTo(0, 0), SetForegroundColor(BORDER), Print("Registers:"))?;
        queue!(out, SetForegroundColor(TEXT))?;
        for i in 0..16 {
            let row = (1 + i) as u16;
            let line = format!(
                "r{:02} {:08X} r{:02} {:08X}",
                i,
                cpu.reg(i),
                i + 16,
                cpu.reg(i + 16)
            );
            queue!(out, MoveTo(0, row), Print(line))?;
        }
        queue!(
            out,
            MoveTo(0, 17),
            Print(format!("       pc {:08X}       ", cpu.pc()))
        )?;

        // Trace pane.
        queue!(
            out,
            MoveTo(TRACE_COL, 0),
            SetForegroundColor(BORDER),
            Print(format!(
                "Trace:                     Cycle: {:6}",
                cpu.cycle_count()
            ))
        )?;
        queue!(out, SetForegroundColor(TEXT))?;
        for i in 0..TRACE_SHOW {
            let text = self
                .trace_lines
                .get(i)
                .map_or("", String::as_str);
            let mut line = String::with_capacity(TRACE_WIDTH);
            for ch in text.chars().take(TRACE_WIDTH) {
                line.push(ch);
            }
            while line.len() < TRACE_WIDTH {
                line.push(' ');
            }
            queue!(out, MoveTo(TRACE_COL, (1 + i) as u16), Print(line))?;
        }

        // Log pane.
        queue!(out, MoveTo(0, 18), SetForegroundColor(BORDER), Print("Log:"))?;
        queue!(out, SetForegroundColor(TEXT))?;
        let log_lines = self.logger.recent(LOG_SHOW);
        for i in 0..LOG_SHOW {
            let text = log_lines.get(i).map_or("", String::as_str);
            queue!(
                out,
                MoveTo(0, (19 + i) as u16),
                Print(format!("{text:<80.80}"))
            )?;
        }

        // UART pane.
        queue!(out, MoveTo(0, 25), SetForegroundColor(BORDER), Print("UART data:"))?;
        queue!(out, SetForegroundColor(TEXT))?;
        for (i, line) in self.uart_lines.iter().enumerate() {
            let row = (26 + i) as u16;
            if row >= self.rows {
                break;
            }
            queue!(
                out,
                MoveTo(0, row),
                Print(String::from_utf8_lossy(line).into_owned())
            )?;
        }

        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_display() -> Display {
        // Bypass the terminal-size check: build the pane state directly.
        Display {
            logger: PaneLogger::install(),
            trace_lines: VecDeque::new(),
            uart_lines: vec![vec![b' '; UART_WIDTH]; UART_SHOW],
            uart_x: 0,
            uart_y: 0,
            rows: 32,
        }
    }

    fn pane_text(d: &Display, row: usize) -> String {
        String::from_utf8_lossy(&d.uart_lines[row]).trim_end().to_string()
    }

    #[test]
    fn printable_bytes_advance_the_cursor() {
        let mut d = make_display();
        for b in b"Hello" {
            d.uart_write(*b);
        }
        assert_eq!(pane_text(&d, 0), "Hello");
        assert_eq!(d.uart_x, 5);
    }

    #[test]
    fn carriage_return_rewinds_the_column() {
        let mut d = make_display();
        for b in b"abc\rX" {
            d.uart_write(*b);
        }
        assert_eq!(pane_text(&d, 0), "Xbc");
    }

    #[test]
    fn newline_moves_to_the_next_row() {
        let mut d = make_display();
        for b in b"one\ntwo" {
            d.uart_write(*b);
        }
        assert_eq!(pane_text(&d, 0), "one");
        assert_eq!(pane_text(&d, 1), "two");
    }

    #[test]
    fn overflow_scrolls_the_pane() {
        let mut d = make_display();
        for row in 0..UART_SHOW + 1 {
            for b in format!("line{row}\n").bytes() {
                d.uart_write(b);
            }
        }
        assert_eq!(pane_text(&d, 0), "line1", "first line scrolled away");
        assert_eq!(pane_text(&d, UART_SHOW - 1), format!("line{UART_SHOW}"));
    }

    #[test]
    fn long_line_wraps() {
        let mut d = make_display();
        for _ in 0..UART_WIDTH + 3 {
            d.uart_write(b'x');
        }
        assert_eq!(d.uart_y, 1);
        assert_eq!(d.uart_x, 3);
    }

    #[test]
    fn unprintable_bytes_are_dropped() {
        let mut d = make_display();
        d.uart_write(0x07);
        d.uart_write(b'A');
        assert_eq!(pane_text(&d, 0), "A");
        assert_eq!(d.uart_x, 1);
    }
}
