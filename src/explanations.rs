//! Patient-facing explanation text per diagnosis category

use serde::Serialize;

/// Description of a diagnosis and the recommended next step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub label: &'static str,
    pub description: &'static str,
    pub action: &'static str,
}

const EXPLANATIONS: &[Explanation] = &[
    Explanation {
        label: "Abses Hati",
        description: "Abses hati (abses hepar) adalah kantong berisi nanah yang terbentuk di dalam hati. \
            Umumnya disebabkan oleh infeksi bakteri atau ameba yang masuk ke hati melalui luka tusuk pada perut, \
            atau penyebaran infeksi dari organ pencernaan lain.",
        action: "Segera konsultasikan ke dokter untuk pemeriksaan lanjutan (USG, CT Scan) dan kemungkinan \
            pemberian antibiotik atau drainase. Minum antibiotik sesuai anjuran dokter, rutin cek kesehatan, \
            cuci tangan pakai sabun sebelum makan, masak makanan hingga matang, dan hindari jajan sembarangan.",
    },
    Explanation {
        label: "Hepatitis Akut",
        description: "Hepatitis akut adalah peradangan hati yang muncul secara tiba-tiba, umumnya karena infeksi \
            virus, obat, atau zat toksik. Penyakit ini paling sering disebabkan oleh infeksi virus hepatitis \
            A, B, C, D, dan E.",
        action: "Istirahat total, pemantauan fungsi hati, hindari obat sembarangan, dan segera periksa ke dokter. \
            Cuci tangan sebelum dan sesudah beraktivitas, pastikan makanan matang dan bersih, hindari kontak \
            dengan orang yang sakit, dan jangan bergantian alat makan.",
    },
    Explanation {
        label: "Hepatitis Kronis",
        description: "Hepatitis kronis adalah peradangan hati jangka panjang yang bisa disebabkan oleh virus \
            hepatitis B atau C. Virus ini dapat ditularkan melalui kontak seksual, darah, atau cairan tubuh \
            lain, misalnya lewat jarum suntik atau transfusi darah.",
        action: "Lakukan tes darah lanjutan serta konsultasi dengan dokter untuk diagnosis dan rencana pengobatan. \
            Berhenti minum alkohol, hindari obat tanpa resep dokter, istirahat cukup, konsumsi makanan sehat, \
            jangan berbagi alat pribadi, dan lakukan hubungan seks yang aman.",
    },
    Explanation {
        label: "Infeksi Parasit atau Virus",
        description: "Infeksi ini disebabkan oleh parasit atau virus lain di luar hepatitis, seperti amuba atau \
            virus saluran cerna. Parasit masuk ke tubuh melalui mulut atau kulit, lalu berkembang dan \
            menginfeksi organ tertentu.",
        action: "Jika gejala infeksi tidak membaik setelah 3 hari, segera periksakan diri ke dokter umum. \
            Pemeriksaan laboratorium lanjutan mungkin diperlukan; perawatan tergantung penyebab spesifik, \
            misalnya antiparasit atau antivirus.",
    },
];

/// Explanation for a predicted category; `None` for categories without text
pub fn explain(label: &str) -> Option<&'static Explanation> {
    let label = label.trim();
    EXPLANATIONS.iter().find(|e| e.label.eq_ignore_ascii_case(label))
}

/// Every category that has explanation text
pub fn known_labels() -> impl Iterator<Item = &'static str> {
    EXPLANATIONS.iter().map(|e| e.label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_labels_have_text() {
        for label in known_labels() {
            let e = explain(label).unwrap();
            assert!(!e.description.is_empty());
            assert!(!e.action.is_empty());
        }
        assert_eq!(known_labels().count(), 4);
    }

    #[test]
    fn test_lookup_is_trimmed_and_case_insensitive() {
        assert_eq!(explain(" hepatitis akut ").map(|e| e.label), Some("Hepatitis Akut"));
    }

    #[test]
    fn test_unknown_label_has_no_explanation() {
        assert!(explain("Sirosis").is_none());
    }
}
