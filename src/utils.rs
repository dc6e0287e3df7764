pub fn cookie(name: &str, value: &str) -> String {
    format!("{name}={value}; HttpOnly; Max-Age=2592000; Secure; Path=/; SameSite=Strict")
}

pub fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}
