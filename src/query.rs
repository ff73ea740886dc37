// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// Copyright (c) 2023, Rob Norris <robn@despairlabs.com>

//! The request/response loop.
//!
//! Input is a stream of `<dataset> <object>` records, split on whitespace
//! (a record may straddle lines). Each record produces exactly one output
//! line, flushed straight away:
//!
//! ```text
//! <dataset> <object> <generation>
//! <dataset> <object> ERROR <errno> <message>
//! ```
//!
//! A failed lookup is reported and the loop carries on. A record without a
//! usable object id ends the loop; that includes an id of `0`, which the
//! protocol uses to mean "nothing supplied", and running out of input.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, BufRead, Write};
use crate::ioc::{Device, Handle};

pub const READ_ERROR: &str = "[zgen] ERROR while reading";

#[derive(Debug)]
pub enum Malformed {
    EndOfInput,
    MissingObject,
    InvalidObject(String),
    ZeroObject,
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Malformed::EndOfInput       => f.write_str("end of input"),
            Malformed::MissingObject    => f.write_str("missing object id"),
            Malformed::InvalidObject(s) => write!(f, "invalid object id '{}'", s),
            Malformed::ZeroObject       => f.write_str("object id 0"),
        }
    }
}

// why the loop stopped. there is no "finished" case; it only ever stops
// because something went wrong
#[derive(Debug)]
pub enum Stop {
    Malformed(Malformed),
    Input(io::Error),
    Output(io::Error),
}

impl fmt::Display for Stop {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stop::Malformed(m) => write!(f, "malformed input: {}", m),
            Stop::Input(e)     => write!(f, "input error: {}", e),
            Stop::Output(e)    => write!(f, "output error: {}", e),
        }
    }
}

impl std::error::Error for Stop {}

#[derive(Debug, PartialEq)]
pub struct Record {
    pub name: Vec<u8>,
    pub obj: u64,
}

// whitespace-separated words pulled from a line-oriented reader
pub struct Tokens<R> {
    input: R,
    pending: VecDeque<Vec<u8>>,
    line: Vec<u8>,
}

impl<R: BufRead> Tokens<R> {
    pub fn new(input: R) -> Tokens<R> {
        Tokens {
            input,
            pending: VecDeque::new(),
            line: Vec::new(),
        }
    }

    pub fn next_token(&mut self) -> io::Result<Option<Vec<u8>>> {
        while self.pending.is_empty() {
            self.line.clear();
            if self.input.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(None);
            }
            self.pending.extend(
                self.line
                    .split(|b| b.is_ascii_whitespace())
                    .filter(|w| !w.is_empty())
                    .map(|w| w.to_vec()),
            );
        }
        Ok(self.pending.pop_front())
    }

    pub fn next_record(&mut self) -> Result<Record, Stop> {
        let name = match self.next_token().map_err(Stop::Input)? {
            Some(name) => name,
            None => return Err(Stop::Malformed(Malformed::EndOfInput)),
        };
        let word = match self.next_token().map_err(Stop::Input)? {
            Some(word) => word,
            None => return Err(Stop::Malformed(Malformed::MissingObject)),
        };
        let obj = std::str::from_utf8(&word)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| {
                Stop::Malformed(Malformed::InvalidObject(
                    String::from_utf8_lossy(&word).into_owned(),
                ))
            })?;
        if obj == 0 {
            return Err(Stop::Malformed(Malformed::ZeroObject));
        }
        Ok(Record { name, obj })
    }
}

fn report<W: Write>(out: &mut W, rec: &Record, res: Result<u64, nix::errno::Errno>) -> io::Result<()> {
    out.write_all(&rec.name)?;
    match res {
        Ok(gen) => writeln!(out, " {} {}", rec.obj, gen)?,
        Err(e)  => writeln!(out, " {} ERROR {} {}", rec.obj, e as i32, e.desc())?,
    }
    out.flush()
}

// run until the input stops making sense. never returns on success, because
// there is no success
pub fn run<D: Device, R: BufRead, W: Write>(h: &mut Handle<D>, input: R, out: &mut W) -> Stop {
    let mut tokens = Tokens::new(input);

    loop {
        let rec = match tokens.next_record() {
            Ok(rec) => rec,
            Err(stop) => {
                if let Err(e) = writeln!(out, "{}", READ_ERROR).and_then(|_| out.flush()) {
                    return Stop::Output(e);
                }
                return stop;
            }
        };

        log::debug!("lookup {} {}", String::from_utf8_lossy(&rec.name), rec.obj);
        let res = h.obj_to_stats(&rec.name, rec.obj);
        if let Err(e) = res {
            log::warn!("{} {}: {}", String::from_utf8_lossy(&rec.name), rec.obj, e.desc());
        }

        if let Err(e) = report(out, &rec, res) {
            return Stop::Output(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ioc::tests::StubDevice;
    use nix::errno::Errno;
    use std::io::Cursor;

    fn drive(dev: StubDevice, input: &str) -> (Handle<StubDevice>, String, Stop) {
        let mut h = Handle::new(dev);
        let mut out = Vec::new();
        let stop = run(&mut h, Cursor::new(input), &mut out);
        (h, String::from_utf8(out).unwrap(), stop)
    }

    #[test]
    fn single_lookup() {
        let (h, out, stop) = drive(StubDevice::new(7), "tank/data 42\n");
        assert_eq!(out, format!("tank/data 42 7\n{}\n", READ_ERROR));
        assert!(matches!(stop, Stop::Malformed(Malformed::EndOfInput)));
        assert_eq!(h.device().calls.len(), 1);
    }

    #[test]
    fn several_lookups() {
        let input = "tank/a 1\ntank/b 2\ntank/c@snap 18446744073709551615\n";
        let (_, out, _) = drive(StubDevice::new(1234), input);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(
            lines,
            [
                "tank/a 1 1234",
                "tank/b 2 1234",
                "tank/c@snap 18446744073709551615 1234",
                READ_ERROR,
            ]
        );
    }

    #[test]
    fn zero_stops_without_dispatch() {
        let input = "tank/data 5\ntank/data 0\ntank/data 6\n";
        let (h, out, stop) = drive(StubDevice::new(3), input);
        assert_eq!(out, format!("tank/data 5 3\n{}\n", READ_ERROR));
        assert!(matches!(stop, Stop::Malformed(Malformed::ZeroObject)));
        assert_eq!(h.device().calls, vec![(b"tank/data".to_vec(), 5)]);
    }

    #[test]
    fn zero_first() {
        let (h, out, _) = drive(StubDevice::new(7), "tank/data 0\n");
        assert_eq!(out, format!("{}\n", READ_ERROR));
        assert!(h.device().calls.is_empty());
    }

    #[test]
    fn garbage_object_id() {
        for bad in ["tank x", "tank -1", "tank 12abc", "tank 99999999999999999999"] {
            let (h, out, stop) = drive(StubDevice::new(7), bad);
            assert_eq!(out, format!("{}\n", READ_ERROR));
            assert!(matches!(stop, Stop::Malformed(Malformed::InvalidObject(_))));
            assert!(h.device().calls.is_empty());
        }
    }

    #[test]
    fn missing_object_id() {
        let (_, _, stop) = drive(StubDevice::new(7), "tank/data\n");
        assert!(matches!(stop, Stop::Malformed(Malformed::MissingObject)));
    }

    #[test]
    fn empty_input() {
        let (h, out, stop) = drive(StubDevice::new(7), "");
        assert_eq!(out, format!("{}\n", READ_ERROR));
        assert!(matches!(stop, Stop::Malformed(Malformed::EndOfInput)));
        assert!(h.device().calls.is_empty());
    }

    #[test]
    fn failure_is_not_fatal() {
        let mut dev = StubDevice::new(9);
        dev.fail.push((2, Errno::ENOENT));
        let (h, out, _) = drive(dev, "tank 1 tank 2 tank 3");
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "tank 1 9");
        assert_eq!(lines[1], format!("tank 2 ERROR 2 {}", Errno::ENOENT.desc()));
        assert_eq!(lines[2], "tank 3 9");
        assert_eq!(h.device().calls.len(), 3);
    }

    #[test]
    fn records_span_lines() {
        let (_, out, _) = drive(StubDevice::new(4), "  tank/data\n\n\t42   tank/other\n43\n");
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[..2], ["tank/data 42 4", "tank/other 43 4"]);
    }

    #[test]
    fn long_name_reported_whole() {
        let name = "p/".repeat(3000);
        let (h, out, _) = drive(StubDevice::new(11), &format!("{} 77\n", name));
        assert!(out.starts_with(&format!("{} 77 11\n", name)));
        assert_eq!(h.device().calls[0].0.len(), crate::sys::MAXPATHLEN - 1);
    }

    #[test]
    fn output_failure_stops() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut h = Handle::new(StubDevice::new(1));
        let stop = run(&mut h, Cursor::new("tank 1\ntank 2\n"), &mut Broken);
        assert!(matches!(stop, Stop::Output(_)));
        assert_eq!(h.device().calls.len(), 1);
    }
}
