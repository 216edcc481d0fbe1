//! 内置演示代码
//!
//! 当仓库里没有可分析的文件时，用这些已知漏洞模式代替，保证不会把空语料交给分析服务。

use crate::model::ContentUnit;

/// 演示用的漏洞代码片段：字符串拼接 SQL 和未转义的 HTML 输出
pub const SAMPLE_VULNERABLE_CODE: &str = r#"import sqlite3

def get_user_data(username):
    conn = sqlite3.connect('users.db')
    cursor = conn.cursor()
    # Vulnerable to SQL Injection
    query = "SELECT * FROM users WHERE username = '" + username + "'"
    cursor.execute(query)
    data = cursor.fetchall()
    conn.close()
    return data

def render_profile(user_input):
    # Vulnerable to XSS
    return "<h1>Profile for " + user_input + "</h1>"
"#;

const USER_LOOKUP: &str = r#"import sqlite3

def get_user(user_id):
    conn = sqlite3.connect('database.db')
    cursor = conn.cursor()

    # Vulnerable SQL query
    query = f"SELECT * FROM users WHERE id = {user_id}"
    cursor.execute(query)

    data = cursor.fetchall()
    conn.close()
    return data
"#;

const PAYMENTS: &str = r#"import sqlite3

def process_payment(user_id, amount):
    # Business logic vulnerability
    if amount < 0:
        return "Invalid amount"

    # No validation for duplicate payments
    save_payment(user_id, amount)
    return "Payment processed"

def save_payment(user_id, amount):
    # Hardcoded database path
    conn = sqlite3.connect('/var/data/payments.db')
    cursor = conn.cursor()
    cursor.execute(f"INSERT INTO payments VALUES ({user_id}, {amount})")
    conn.commit()
    conn.close()
"#;

pub const FALLBACK_PREFIX: &str = "sentinel-samples/";

/// 固定的演示语料，每次调用返回相同内容
pub fn fallback_units() -> Vec<ContentUnit> {
    vec![
        ContentUnit::synthetic(format!("{}user_lookup.py", FALLBACK_PREFIX), USER_LOOKUP),
        ContentUnit::synthetic(format!("{}payments.py", FALLBACK_PREFIX), PAYMENTS),
    ]
}
