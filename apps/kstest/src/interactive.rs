use crate::runner::Runner;
use anyhow::Result;
use ks_protocol::DeviceClass;
use std::io::{BufRead, Write};

/// Menu-driven test selection over any line-oriented input.
pub fn run<R: BufRead, W: Write>(runner: &Runner, input: &mut R, out: &mut W) -> Result<()> {
    writeln!(out, "KSTEST interactive mode")?;
    loop {
        writeln!(out, "\nSelect device type:")?;
        for (i, class) in DeviceClass::ALL.iter().enumerate() {
            writeln!(out, "  {}. {}", i + 1, class)?;
        }
        let class = loop {
            let Some(line) = prompt(input, out, "Enter number (1-3): ")? else {
                return Ok(());
            };
            match line.parse::<usize>() {
                Ok(n) if (1..=DeviceClass::ALL.len()).contains(&n) => {
                    break DeviceClass::ALL[n - 1]
                }
                _ => writeln!(out, "Invalid input. Please enter a number.")?,
            }
        };

        let selection = if class == DeviceClass::Dispenser {
            Some(None)
        } else {
            select_device(runner, class, input, out)?
        };
        let Some(index) = selection else {
            return Ok(());
        };
        if let Err(e) = runner.run_class(class, index) {
            writeln!(out, "test failed: {e:#}")?;
        }

        let again = loop {
            let Some(line) = prompt(input, out, "\nPerform another test? (y/n): ")? else {
                return Ok(());
            };
            match line.to_lowercase().as_str() {
                "y" | "yes" => break true,
                "n" | "no" => break false,
                _ => {}
            }
        };
        if !again {
            writeln!(out, "Exiting interactive mode.")?;
            return Ok(());
        }
    }
}

/// `Some(None)` selects every device; outer `None` means input ended.
fn select_device<R: BufRead, W: Write>(
    runner: &Runner,
    class: DeviceClass,
    input: &mut R,
    out: &mut W,
) -> Result<Option<Option<i64>>> {
    let names = runner.config.device_names(class);
    writeln!(out, "\nSelect a {class} device:")?;
    for (i, name) in names.iter().enumerate() {
        writeln!(out, "  {i}. {name}")?;
    }
    writeln!(out, "  all - test all devices")?;
    let last = names.len().saturating_sub(1);
    loop {
        let Some(line) = prompt(
            input,
            out,
            &format!("Enter device index (0-{last}) or 'all': "),
        )?
        else {
            return Ok(None);
        };
        if line.eq_ignore_ascii_case("all") {
            return Ok(Some(None));
        }
        match line.parse::<i64>() {
            Ok(idx) if idx >= 0 && (idx as usize) < names.len() => return Ok(Some(Some(idx))),
            Ok(_) => writeln!(out, "Invalid index.")?,
            Err(_) => writeln!(out, "Invalid input. Please enter a number or 'all'.")?,
        }
    }
}

fn prompt<R: BufRead, W: Write>(input: &mut R, out: &mut W, text: &str) -> Result<Option<String>> {
    write!(out, "{text}")?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
