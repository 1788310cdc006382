use crate::commands::command_error::CommandError;
use crate::resp::RespValue;
use crate::server::ServerConfig;

pub struct ConfigGetArguments {
    parameters: Vec<String>,
}

impl ConfigGetArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        let Some(subcommand) = arguments.first() else {
            return Err(CommandError::WrongNumberOfArguments("config"));
        };

        if !subcommand.eq_ignore_ascii_case("get") {
            return Err(CommandError::UnknownConfigSubcommand(subcommand.clone()));
        }

        if arguments.len() < 2 {
            return Err(CommandError::WrongNumberOfArguments("config|get"));
        }

        Ok(Self {
            parameters: arguments[1..].to_vec(),
        })
    }
}

/// CONFIG GET returns an array of alternating parameter names and values for
/// the recognized parameters `dir` and `dbfilename`.
pub fn config_get(
    config: &ServerConfig,
    arguments: &[String],
) -> Result<RespValue, CommandError> {
    let config_arguments = ConfigGetArguments::parse(arguments)?;

    let mut response = Vec::with_capacity(config_arguments.parameters.len() * 2);

    for parameter in config_arguments.parameters {
        let value = match parameter.to_lowercase().as_str() {
            "dir" => config.dir.clone(),
            "dbfilename" => config.dbfilename.clone(),
            _ => return Err(CommandError::UnknownConfigParameter(parameter)),
        };

        response.push(RespValue::BulkString(parameter.to_lowercase()));
        response.push(RespValue::BulkString(value));
    }

    Ok(RespValue::Array(response))
}
