use crate::commands::command_error::CommandError;
use crate::resp::RespValue;

pub struct EchoArguments {
    message: String,
}

impl EchoArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongNumberOfArguments("echo"));
        }

        Ok(Self {
            message: arguments[0].clone(),
        })
    }
}

pub fn echo(arguments: &[String]) -> Result<RespValue, CommandError> {
    let echo_arguments = EchoArguments::parse(arguments)?;

    Ok(RespValue::BulkString(echo_arguments.message))
}

#[cfg(test)]
mod tests {
    use super::echo;
    use crate::commands::command_error::CommandError;

    #[test]
    fn test_echo() {
        let test_cases = vec![
            (vec!["hey".to_string()], Ok("$3\r\nhey\r\n".to_string())),
            (vec!["".to_string()], Ok("$0\r\n\r\n".to_string())),
            (
                Vec::new(),
                Err(CommandError::WrongNumberOfArguments("echo")),
            ),
            (
                vec!["a".to_string(), "b".to_string()],
                Err(CommandError::WrongNumberOfArguments("echo")),
            ),
        ];

        for (arguments, expected) in test_cases {
            let result = echo(&arguments).map(|v| v.encode());
            assert_eq!(result, expected, "echoing {:?}", arguments);
        }
    }
}
