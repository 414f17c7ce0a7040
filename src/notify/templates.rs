pub const VERIFY_SUBJECT: &str = "Verify Your COOKit Account";
pub const WELCOME_SUBJECT: &str = "Welcome to COOKit!";

pub fn verification_html(username: &str, url: &str, ttl_hours: i64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <h1>COOKit</h1>
  <h2>Welcome to COOKit, {username}!</h2>
  <p>To activate your account, verify your email address:</p>
  <p><a href="{url}">Verify Email Address</a></p>
  <p>Or paste this link into your browser:</p>
  <p style="word-break: break-all;">{url}</p>
  <p><strong>This link expires in {ttl_hours} hours.</strong></p>
  <p>If you didn't create an account with COOKit, ignore this email.</p>
</body>
</html>"#
    )
}

pub fn welcome_html(username: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <h1>COOKit</h1>
  <h2>Your account is activated!</h2>
  <p>Hi {username},</p>
  <p>Your COOKit account has been verified. You can now browse and share recipes.</p>
  <p>Happy cooking!</p>
</body>
</html>"#
    )
}
