// ==========================================
// 测试数据生成器
// ==========================================
// 用途: 生成工时导入测试数据集 CSV 文件
// 输出: tests/fixtures/datasets/*.csv
// ==========================================

use chrono::{Duration, Local, NaiveDateTime};
use csv::Writer;
use std::error::Error;
use std::fs::{self, File};

const OUTPUT_DIR: &str = "tests/fixtures/datasets";

// CSV 表头（与 ERP 工时导出一致）
const CSV_HEADER: &[&str] = &[
    "ID",
    "Employee",
    "Work Center",
    "Operation",
    "Work Order",
    "Manufacturing Order",
    "Routing",
    "Duration",
    "Quantity Done",
    "Production Quantity",
    "Created on",
];

const OPERATORS: &[&str] = &["Gus", "Ana", "Lee", "Mia", "Raj", "Zoe"];
const ROUTINGS: &[&str] = &["Tote", "Backpack", "Wallet", "Leash"];
const WORK_CENTERS: &[(&str, &str)] = &[
    ("Sewing Line 1", "Assembly"),
    ("Rope Station", "Rope Assembly"),
    ("Cutting Table", "Cut"),
    ("Packing Bench", "Packaging"),
];

// 工时记录结构
#[derive(Clone)]
struct CycleRecord {
    cycle_id: String,
    operator: String,
    work_center: String,
    operation: String,
    work_order: String,
    mo_number: String,
    routing: String,
    duration: String,
    quantity_done: String,
    production_qty: String,
    created_on: String,
}

impl CycleRecord {
    fn to_row(&self) -> Vec<String> {
        vec![
            self.cycle_id.clone(),
            self.operator.clone(),
            self.work_center.clone(),
            self.operation.clone(),
            self.work_order.clone(),
            self.mo_number.clone(),
            self.routing.clone(),
            self.duration.clone(),
            self.quantity_done.clone(),
            self.production_qty.clone(),
            self.created_on.clone(),
        ]
    }
}

fn hms(secs: i64) -> String {
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn base_time() -> NaiveDateTime {
    (Local::now() - Duration::days(30)).naive_local()
}

// 生成正常记录；偶数行用 H:MM:SS，奇数行用整数秒
fn generate_normal_record(index: usize) -> CycleRecord {
    let (work_center, operation) = WORK_CENTERS[index % WORK_CENTERS.len()];
    let duration_secs = 900 + ((index * 137) % 5400) as i64;
    let quantity = 5 + (index * 7) % 40;
    let created_on = base_time() + Duration::minutes(index as i64 * 17);

    CycleRecord {
        cycle_id: format!("WC{:06}", index + 1),
        operator: OPERATORS[index % OPERATORS.len()].to_string(),
        work_center: work_center.to_string(),
        operation: operation.to_string(),
        work_order: format!("WO{:06}", index + 1),
        mo_number: format!("MO{:05}", index / 2 + 1),
        routing: ROUTINGS[(index / 3) % ROUTINGS.len()].to_string(),
        duration: if index % 2 == 0 {
            hms(duration_secs)
        } else {
            duration_secs.to_string()
        },
        quantity_done: quantity.to_string(),
        production_qty: if index % 5 == 0 {
            (quantity + 2).to_string()
        } else {
            String::new()
        },
        created_on: created_on.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

fn write_dataset(file_name: &str, records: &[CycleRecord]) -> Result<(), Box<dyn Error>> {
    let path = format!("{}/{}", OUTPUT_DIR, file_name);
    let file = File::create(&path)?;
    let mut wtr = Writer::from_writer(file);

    wtr.write_record(CSV_HEADER)?;
    for record in records {
        wtr.write_record(record.to_row())?;
    }
    wtr.flush()?;

    println!("✓ {} ({} 条)", path, records.len());
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    println!("开始生成测试数据集...");
    fs::create_dir_all(OUTPUT_DIR)?;

    // 1. 正常数据 (200条)
    generate_normal_data()?;

    // 2. 大数据集 (5000条)
    generate_large_dataset()?;

    // 3. 拆分行（0 秒碎片 + 0 数量主行）
    generate_split_rows()?;

    // 4. 批次内重复
    generate_duplicate_within_batch()?;

    // 5. 非法行（时长非法 / 关键字段缺失 / 数量非法）
    generate_invalid_rows()?;

    // 6. 损坏时长（超过硬阈值或小时/件上限）
    generate_corrupted_durations()?;

    println!("✓ 所有测试数据集生成完成！");
    Ok(())
}

fn generate_normal_data() -> Result<(), Box<dyn Error>> {
    let records: Vec<CycleRecord> = (0..200).map(generate_normal_record).collect();
    write_dataset("01_normal_cycles.csv", &records)
}

fn generate_large_dataset() -> Result<(), Box<dyn Error>> {
    let records: Vec<CycleRecord> = (0..5000).map(generate_normal_record).collect();
    write_dataset("02_large_dataset.csv", &records)
}

fn generate_split_rows() -> Result<(), Box<dyn Error>> {
    let mut records = Vec::new();
    for i in 0..20 {
        let mut main = generate_normal_record(i);
        main.work_order = format!("WO-SPLIT-{:03}", i);
        main.quantity_done = "0".to_string();

        // 同一 (MO, 工序, 工单) 下的 0 秒碎片携带数量
        let mut fragment = main.clone();
        fragment.cycle_id = format!("{}-F", main.cycle_id);
        fragment.duration = "0:00:00".to_string();
        fragment.quantity_done = (10 + i).to_string();

        records.push(main);
        records.push(fragment);
    }
    write_dataset("03_split_rows.csv", &records)
}

fn generate_duplicate_within_batch() -> Result<(), Box<dyn Error>> {
    let mut records: Vec<CycleRecord> = (0..30).map(generate_normal_record).collect();
    // 重复前 5 条（同 ID，先到者为准）
    for i in 0..5 {
        let mut dup = generate_normal_record(i);
        dup.quantity_done = "999".to_string();
        records.push(dup);
    }
    write_dataset("04_duplicate_within_batch.csv", &records)
}

fn generate_invalid_rows() -> Result<(), Box<dyn Error>> {
    let mut records: Vec<CycleRecord> = (0..10).map(generate_normal_record).collect();

    let mut bad_duration = generate_normal_record(10);
    bad_duration.duration = "abc".to_string();
    records.push(bad_duration);

    let mut bad_minutes = generate_normal_record(11);
    bad_minutes.duration = "1:75:00".to_string();
    records.push(bad_minutes);

    let mut negative = generate_normal_record(12);
    negative.duration = "-600".to_string();
    records.push(negative);

    let mut missing_operator = generate_normal_record(13);
    missing_operator.operator = String::new();
    records.push(missing_operator);

    let mut missing_routing = generate_normal_record(14);
    missing_routing.routing = "N/A".to_string();
    records.push(missing_routing);

    let mut bad_quantity = generate_normal_record(15);
    bad_quantity.quantity_done = "twelve".to_string();
    records.push(bad_quantity);

    write_dataset("05_invalid_rows.csv", &records)
}

fn generate_corrupted_durations() -> Result<(), Box<dyn Error>> {
    let mut records: Vec<CycleRecord> = (0..10).map(generate_normal_record).collect();

    // 9 小时单条工时，超过默认 8 小时硬阈值
    let mut over_cap = generate_normal_record(10);
    over_cap.duration = hms(9 * 3600);
    records.push(over_cap);

    // 组装工作中心 6 小时仅 1 件，超过 2 小时/件上限
    let mut slow = generate_normal_record(12);
    slow.cycle_id = "WC-SLOW-1".to_string();
    slow.operator = "Slow".to_string();
    slow.work_center = "Sewing Line 1".to_string();
    slow.operation = "Assembly".to_string();
    slow.duration = hms(6 * 3600);
    slow.quantity_done = "1".to_string();
    slow.production_qty = String::new();
    records.push(slow);

    write_dataset("06_corrupted_durations.csv", &records)
}
