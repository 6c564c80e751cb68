use std::io::{BufRead, Write};

use keepkey_host::PinMatrixKind;

const HARDENED: u32 = 0x8000_0000;

/// Parse a BIP-32 style derivation path (eg. `44'/0'/0'/0/0`) into raw
/// u32 indices, `'` or `h` marking hardened components
pub fn parse_derivation_path(s: &str) -> anyhow::Result<Vec<u32>> {
    s.trim_start_matches("m/")
        .split('/')
        .filter(|c| !c.is_empty())
        .map(|c| {
            let (num, hardened) = match c.strip_suffix('\'').or_else(|| c.strip_suffix('h')) {
                Some(n) => (n, true),
                None => (c, false),
            };

            let v: u32 = num
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid path component '{}'", c))?;

            if v >= HARDENED {
                return Err(anyhow::anyhow!("path component '{}' out of range", c));
            }

            Ok(if hardened { v | HARDENED } else { v })
        })
        .collect()
}

/// Prompt for PIN matrix positions on stdin.
///
/// The device shows the scrambled digit layout on its own screen; the
/// user enters the *positions* of their PIN digits using the reference
/// layout printed here.
pub fn prompt_pin(kind: PinMatrixKind) -> String {
    let prompt = match kind {
        PinMatrixKind::Current => "current PIN",
        PinMatrixKind::NewFirst => "new PIN",
        PinMatrixKind::NewSecond => "new PIN (again)",
    };

    println!("Enter {} using the positions shown on the device:", prompt);
    println!("  7 8 9");
    println!("  4 5 6");
    println!("  1 2 3");
    print!("> ");
    let _ = std::io::stdout().flush();

    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);

    line.trim().to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_path() {
        assert_eq!(
            parse_derivation_path("44'/0'/1'/0/9").unwrap(),
            vec![44 | HARDENED, HARDENED, 1 | HARDENED, 0, 9]
        );
    }

    #[test]
    fn parse_path_prefix_and_h() {
        assert_eq!(
            parse_derivation_path("m/49h/0h/0h").unwrap(),
            vec![49 | HARDENED, HARDENED, HARDENED]
        );
    }

    #[test]
    fn parse_path_invalid() {
        assert!(parse_derivation_path("44'/x/0").is_err());
        assert!(parse_derivation_path("2147483648").is_err());
    }
}
