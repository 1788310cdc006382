use crate::resp::RespValue;

pub fn ping() -> RespValue {
    RespValue::SimpleString("PONG".to_string())
}
