use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::amount::AmountParseError;
use crate::{Amount, Command, UserId, Wallet};

/// Errors that can occur when reading command rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open command file: {0}")]
    Open(csv::Error),

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized operation '{op}'")]
    UnrecognizedOp { line: usize, op: String },

    #[error("line {line}: {op} missing amount")]
    MissingAmount { line: usize, op: String },

    #[error("line {line}: transfer missing destination user")]
    MissingDestination { line: usize },

    #[error("line {line}: {source}")]
    InvalidAmount {
        line: usize,
        source: AmountParseError,
    },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    op: String,
    user: UserId,
    to: Option<UserId>,
    amount: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    user: UserId,
    balance: String,
}

/// Read wallet commands from a csv file.
///
/// Amounts are major-unit decimals (`"12.50"`) and are converted to minor
/// units here; the engine only ever sees minor units.
pub fn read_commands(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Command, CsvError>>, CsvError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(CsvError::Open)?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            parse_row(line, row)
        }))
}

fn parse_row(line: usize, row: InputRow) -> Result<Command, CsvError> {
    let amount = |op: &str| -> Result<Amount, CsvError> {
        let raw = row
            .amount
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| CsvError::MissingAmount {
                line,
                op: op.to_string(),
            })?;
        raw.parse::<Amount>()
            .map_err(|source| CsvError::InvalidAmount { line, source })
    };

    match row.op.as_str() {
        "open" => Ok(Command::Open { user: row.user }),
        "deposit" => Ok(Command::Deposit {
            user: row.user,
            amount: amount("deposit")?,
        }),
        "withdraw" => Ok(Command::Withdraw {
            user: row.user,
            amount: amount("withdraw")?,
        }),
        "transfer" => {
            let to = row.to.ok_or(CsvError::MissingDestination { line })?;
            Ok(Command::Transfer {
                from: row.user,
                to,
                amount: amount("transfer")?,
            })
        }
        other => Err(CsvError::UnrecognizedOp {
            line,
            op: other.to_string(),
        }),
    }
}

/// Write wallet balances in csv format, balances as major-unit decimals
pub fn write_wallets(
    writer: impl io::Write,
    wallets: impl IntoIterator<Item = Wallet>,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);

    for wallet in wallets {
        writer.serialize(OutputRow {
            user: wallet.user,
            balance: wallet.balance.to_string(),
        })?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn read(content: &str) -> Vec<Result<Command, CsvError>> {
        let file = write_csv(content);
        read_commands(file.path()).unwrap().collect()
    }

    #[test]
    fn read_open_and_deposit() {
        let results = read("op,user,to,amount\nopen,1,,\ndeposit,1,,10.5\n");
        assert_eq!(results.len(), 2);

        let commands: Vec<_> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(commands[0], Command::Open { user: 1 });
        assert_eq!(
            commands[1],
            Command::Deposit {
                user: 1,
                amount: Amount::from_minor(1050)
            }
        );
    }

    #[test]
    fn read_withdraw_and_transfer() {
        let results = read("op,user,to,amount\nwithdraw,2,,5.25\ntransfer,2,3,1\n");

        let commands: Vec<_> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            commands,
            vec![
                Command::Withdraw {
                    user: 2,
                    amount: Amount::from_minor(525)
                },
                Command::Transfer {
                    from: 2,
                    to: 3,
                    amount: Amount::from_minor(100)
                },
            ]
        );
    }

    #[test]
    fn read_with_whitespace() {
        let results = read("op, user, to, amount\ndeposit, 1, , 10.00\n");
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[test]
    fn negative_amounts_reach_the_engine() {
        let results = read("op,user,to,amount\ndeposit,1,,-1.00\n");
        assert!(matches!(
            results[0],
            Ok(Command::Deposit { amount, .. }) if amount == Amount::from_minor(-100)
        ));
    }

    #[test]
    fn read_returns_error_for_unknown_op() {
        let results = read("op,user,to,amount\nrefund,1,,10.0\n");
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, CsvError::UnrecognizedOp { line: 2, .. }));
    }

    #[test]
    fn read_returns_error_for_missing_amount() {
        let results = read("op,user,to,amount\ndeposit,1,,\n");
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, CsvError::MissingAmount { line: 2, .. }));
    }

    #[test]
    fn read_returns_error_for_missing_destination() {
        let results = read("op,user,to,amount\nopen,1,,\ntransfer,1,,3\n");
        let err = results[1].as_ref().unwrap_err();
        assert!(matches!(err, CsvError::MissingDestination { line: 3 }));
    }

    #[test]
    fn read_returns_error_for_bad_amount() {
        let results = read("op,user,to,amount\nwithdraw,1,,1.234\n");
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(
            err,
            CsvError::InvalidAmount {
                line: 2,
                source: AmountParseError::TooPrecise(_)
            }
        ));
    }

    #[test]
    fn read_reports_unparseable_rows() {
        let results = read("op,user,to,amount\ndeposit,alice,,1\n");
        assert!(matches!(results[0], Err(CsvError::Parse { line: 2, .. })));
    }

    #[test]
    fn reader_from_owned_path_can_move_to_another_thread() {
        let file = write_csv("op,user,to,amount\nopen,1,,\n");
        let commands = read_commands(file.path().to_path_buf()).unwrap();

        let results: Vec<_> = std::thread::spawn(move || commands.collect())
            .join()
            .unwrap();
        assert!(matches!(results[..], [Ok(Command::Open { user: 1 })]));
    }

    #[test]
    fn open_missing_file_fails() {
        let result = read_commands("/definitely/not/here.csv");
        assert!(matches!(result, Err(CsvError::Open(_))));
    }

    #[test]
    fn write_wallets_formats_balances() {
        let mut out = Vec::new();
        write_wallets(
            &mut out,
            vec![
                Wallet {
                    user: 1,
                    balance: Amount::from_minor(2500),
                },
                Wallet::new(2),
            ],
        )
        .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "user,balance\n1,25.00\n2,0.00\n");
    }
}
