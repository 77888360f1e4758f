use std::process::Command;

fn run(fixture: &str, report: &str) -> (String, String, bool) {
    let path = format!("tests/fixtures/{fixture}");
    let output = Command::new(env!("CARGO_BIN_EXE_phone-ledger"))
        .arg(&path)
        .args(["--report", report])
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn bookings_report() {
    let (stdout, stderr, success) = run("lifecycle.csv", "bookings");

    assert!(success);
    assert!(stderr.is_empty());

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines[0],
        "id,owner,date,model,platform,card,status,booking_price,selling_price,profit,batch,dealer_amount,notes"
    );
    assert_eq!(
        lines[1],
        "100,2,2024-05-10,iPhone 15,amazon,hdfc,payment_done,500.00,560.00,60.00,7,550.00,"
    );
    assert_eq!(
        lines[2],
        "101,2,2024-05-11,Pixel 8,flipkart,icici,given_to_dealer,300.00,,,7,320.00,"
    );
    assert_eq!(
        lines[3],
        "102,3,2024-05-12,Galaxy S24,amazon,sbi,delivered,250.00,,,,,gift"
    );
    assert_eq!(lines.len(), 4);
}

#[test]
fn batches_report() {
    let (stdout, _, success) = run("lifecycle.csv", "batches");

    assert!(success);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "id,dealer,mobiles,bookings,total,paid,remaining,status");
    assert_eq!(lines[1], "7,10,2,100 101,870.00,600.00,270.00,partially_paid");
}

#[test]
fn dealers_report() {
    let (stdout, _, success) = run("lifecycle.csv", "dealers");

    assert!(success);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines[1],
        "10,Ravi Mobiles,9876543210,ravi@example.com,MG Road,1,2,870.00,600.00,270.00"
    );
}

#[test]
fn wallet_report() {
    let (stdout, _, success) = run("lifecycle.csv", "wallet");

    assert!(success);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "seq,date,kind,amount,balance,source,description");
    assert_eq!(
        lines[1],
        "1,2024-05-20,credit,600.00,600.00,batch:7,payment from Ravi Mobiles for batch 7"
    );
    assert_eq!(
        lines[2],
        "2,2024-05-21,debit,500.00,100.00,booking:100,payment to alice for booking 100"
    );
    assert_eq!(lines[3], "3,2024-05-22,profit_withdrawal,40.00,60.00,,owner draw");
}

#[test]
fn users_report() {
    let (stdout, _, success) = run("lifecycle.csv", "users");

    assert!(success);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines[0],
        "id,username,role,bookings,with_owner,settled,invested,settled_amount"
    );
    assert_eq!(lines[1], "1,admin,admin,0,0,0,0.00,0.00");
    assert_eq!(lines[2], "2,alice,user,2,0,1,800.00,500.00");
    assert_eq!(lines[3], "3,bob,user,1,1,0,250.00,0.00");
}

#[test]
fn inventory_is_empty_once_everything_is_batched() {
    let (stdout, _, success) = run("lifecycle.csv", "inventory");

    assert!(success);
    assert!(stdout.is_empty());
}

#[test]
fn errors_warn_but_do_not_block() {
    let (stdout, stderr, success) = run("with_errors.csv", "bookings");

    assert!(success);
    assert!(stderr.contains("unrecognized command type"));
    assert!(stderr.contains("missing amount"));
    assert!(stderr.contains("unknown booking status 'shipped'"));

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[1],
        "101,2,2024-05-11,Pixel 8,flipkart,icici,delivered,300.00,,,,,"
    );
}

#[test]
fn missing_file_fails() {
    let (_, stderr, success) = run("does_not_exist.csv", "bookings");

    assert!(!success);
    assert!(stderr.contains("cannot open"));
}
