//! `.env` loading. Values already in the process environment win.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub fn load(path: &Path) -> Result<usize, String> {
    let file = File::open(path).map_err(|e| format!("failed to open {}: {}", path.display(), e))?;
    let mut applied = 0;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| format!("failed to read {} at line {}: {}", path.display(), index + 1, e))?;
        let Some((key, value)) = parse_line(&line).map_err(|e| format!("{}:{}: {}", path.display(), index + 1, e))?
        else {
            continue;
        };
        if std::env::var_os(&key).is_none() {
            // SAFETY: called from main before any other thread exists.
            unsafe {
                std::env::set_var(&key, value);
            }
            applied += 1;
        }
    }
    Ok(applied)
}

/// `KEY=value`, `export KEY=value`, quoted values and `#` comments.
pub fn parse_line(line: &str) -> Result<Option<(String, String)>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

    let (key, raw_value) = line.split_once('=').ok_or_else(|| "missing '=' in assignment".to_string())?;
    let key = key.trim();
    if key.is_empty() {
        return Err("variable name cannot be empty".to_string());
    }
    if key.chars().any(char::is_whitespace) {
        return Err(format!("variable name contains whitespace: {}", key));
    }
    Ok(Some((key.to_string(), parse_value(raw_value.trim())?)))
}

fn parse_value(raw: &str) -> Result<String, String> {
    if let Some(rest) = raw.strip_prefix('"') {
        let mut out = String::new();
        let mut chars = rest.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '\\' => match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(other) => out.push(other),
                    None => return Err("unterminated escape in double-quoted value".to_string()),
                },
                '"' => return closing_quote_tail(chars.as_str()).map(|_| out),
                other => out.push(other),
            }
        }
        Err("unterminated double-quoted value".to_string())
    } else if let Some(rest) = raw.strip_prefix('\'') {
        let (value, tail) = rest
            .split_once('\'')
            .ok_or_else(|| "unterminated single-quoted value".to_string())?;
        closing_quote_tail(tail)?;
        Ok(value.to_string())
    } else {
        Ok(raw.split('#').next().unwrap_or_default().trim_end().to_string())
    }
}

fn closing_quote_tail(tail: &str) -> Result<(), String> {
    let tail = tail.trim();
    if tail.is_empty() || tail.starts_with('#') {
        Ok(())
    } else {
        Err("unexpected characters after closing quote".to_string())
    }
}
