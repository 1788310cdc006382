use crate::commands::command_error::CommandError;
use crate::resp::RespValue;
use crate::server::ServerConfig;

enum InfoSection {
    All,
    Replication,
}

pub struct InfoArguments {
    section: InfoSection,
}

impl InfoArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.len() > 1 {
            return Err(CommandError::WrongNumberOfArguments("info"));
        }

        let section = match arguments.first() {
            None => InfoSection::All,
            Some(section) if section.eq_ignore_ascii_case("replication") => {
                InfoSection::Replication
            }
            Some(section) => return Err(CommandError::UnknownInfoSection(section.clone())),
        };

        Ok(Self { section })
    }
}

/// INFO renders `key:value` lines joined by `\n` as one bulk string. The
/// replication section is the only one this server has, so the all-sections
/// output matches it.
pub fn info(config: &ServerConfig, arguments: &[String]) -> Result<RespValue, CommandError> {
    let info_arguments = InfoArguments::parse(arguments)?;

    let pairs = match info_arguments.section {
        InfoSection::All | InfoSection::Replication => config.replication_info(),
    };

    let lines: Vec<String> = pairs
        .into_iter()
        .map(|(key, value)| format!("{}:{}", key, value))
        .collect();

    Ok(RespValue::BulkString(lines.join("\n")))
}
