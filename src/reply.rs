// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// Copyright (c) 2023, Rob Norris <robn@despairlabs.com>

// the other end of the pipe: for a program that feeds records to zgen and
// wants the answers back as values

use std::fmt;
use nix::errno::Errno;

#[derive(Debug, PartialEq)]
pub enum Reply {
    Generation { name: String, obj: u64, gen: u64 },
    Error { name: String, obj: u64, errno: Errno, message: String },
}

#[derive(Debug, PartialEq)]
pub enum ReplyError {
    Malformed(String),
    Desync { name: String, obj: u64, line: String },
    Lookup(Errno, String),
}

impl fmt::Display for ReplyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReplyError::Malformed(l)          => write!(f, "malformed reply: {}", l),
            ReplyError::Desync { name, obj, line } =>
                write!(f, "reply out of step for {} {}: {}", name, obj, line),
            ReplyError::Lookup(e, m)          => write!(f, "lookup failed: {} {}", *e as i32, m),
        }
    }
}

impl std::error::Error for ReplyError {}

impl Reply {
    pub fn parse(line: &str) -> Result<Reply, ReplyError> {
        let malformed = || ReplyError::Malformed(line.to_string());

        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() < 3 {
            return Err(malformed());
        }

        let name = words[0].to_string();
        let obj = words[1].parse::<u64>().map_err(|_| malformed())?;

        if words[2] == "ERROR" {
            let code = words.get(3).and_then(|w| w.parse::<i32>().ok()).ok_or_else(malformed)?;
            return Ok(Reply::Error {
                name,
                obj,
                errno: Errno::from_raw(code),
                message: words[4..].join(" "),
            });
        }

        if words.len() != 3 {
            return Err(malformed());
        }
        let gen = words[2].parse::<u64>().map_err(|_| malformed())?;
        Ok(Reply::Generation { name, obj, gen })
    }

    fn key(&self) -> (&str, u64) {
        match self {
            Reply::Generation { name, obj, .. } => (name.as_str(), *obj),
            Reply::Error { name, obj, .. }      => (name.as_str(), *obj),
        }
    }

    // check the reply answers the question we asked. a missing object isn't
    // an error, it just has no generation
    pub fn generation_for(self, name: &str, obj: u64) -> Result<Option<u64>, ReplyError> {
        if self.key() != (name, obj) {
            let line = format!("{:?}", self);
            return Err(ReplyError::Desync { name: name.to_string(), obj, line });
        }
        match self {
            Reply::Generation { gen, .. } => Ok(Some(gen)),
            Reply::Error { errno: Errno::ENOENT, .. } => Ok(None),
            Reply::Error { errno, message, .. } => Err(ReplyError::Lookup(errno, message)),
        }
    }
}
