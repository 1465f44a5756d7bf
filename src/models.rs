//! Typed records returned by the FIB API.
//!
//! Each record is built by an explicit constructor that checks the required
//! fields and reports the first offending one. Field names follow the API.

mod fields;

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;

use crate::ValidationError;

use fields::{Fields, strip_tags};

/// A value that can be built from one JSON object of an API response.
pub trait Record: Sized {
    const NAME: &'static str;

    fn from_json(value: &Value) -> Result<Self, ValidationError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseObligation {
    pub codi_oblig: String,
    pub codi_especialitat: String,
    pub pla: String,
    pub nom_especialitat: String,
}

impl Record for CourseObligation {
    const NAME: &'static str = "CourseObligation";

    fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let f = Fields::new(Self::NAME, value)?;
        Ok(Self {
            codi_oblig: f.string("codi_oblig")?,
            codi_especialitat: f.string_or_default("codi_especialitat")?,
            pla: f.string("pla")?,
            nom_especialitat: f.string_or_default("nom_especialitat")?,
        })
    }
}

/// A course (`assignatura`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    pub id: String,
    pub url: String,
    pub guia: Option<String>,
    pub obligatorietats: Vec<CourseObligation>,
    pub plans: Vec<String>,
    /// Teaching languages keyed by term.
    pub lang: BTreeMap<String, Vec<String>>,
    pub quadrimestres: Vec<String>,
    pub sigles: String,
    pub codi_upc: String,
    pub semestre: String,
    pub credits: f64,
    pub vigent: String,
    pub guia_docent_externa: String,
    pub nom: String,
    pub guia_docent_url_publica: String,
}

impl Course {
    pub fn is_active(&self) -> bool {
        self.vigent == "S"
    }
}

impl Record for Course {
    const NAME: &'static str = "Course";

    fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let f = Fields::new(Self::NAME, value)?;
        Ok(Self {
            id: f.string("id")?,
            url: f.string("url")?,
            guia: f.opt_string("guia")?,
            obligatorietats: f.records("obligatorietats")?,
            plans: f.string_list("plans")?,
            lang: f.string_list_map("lang")?,
            quadrimestres: f.string_list("quadrimestres")?,
            sigles: f.string("sigles")?,
            codi_upc: f.string("codi_upc")?,
            semestre: f.string("semestre")?,
            credits: f.float("credits")?,
            vigent: f.string("vigent")?,
            guia_docent_externa: f.string_or_default("guia_docent_externa")?,
            nom: f.string("nom")?,
            guia_docent_url_publica: f.string_or_default("guia_docent_url_publica")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exam {
    pub id: i64,
    pub assig: String,
    pub codi_upc: String,
    pub aules: String,
    pub inici: NaiveDateTime,
    pub fi: NaiveDateTime,
    pub quatr: i64,
    /// First calendar year of the academic year (2023 for 2023-2024).
    pub curs: i64,
    pub pla: String,
    pub tipus: String,
    pub tipus_assignatura: String,
    pub comentaris: String,
    pub eslaboratori: String,
}

impl Exam {
    pub fn is_final(&self) -> bool {
        self.tipus == "F"
    }

    pub fn is_partial(&self) -> bool {
        self.tipus == "P"
    }
}

impl Record for Exam {
    const NAME: &'static str = "Exam";

    fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let f = Fields::new(Self::NAME, value)?;
        Ok(Self {
            id: f.int("id")?,
            assig: f.string("assig")?,
            codi_upc: f.string("codi_upc")?,
            aules: f.string("aules")?,
            inici: f.datetime("inici")?,
            fi: f.datetime("fi")?,
            quatr: f.int("quatr")?,
            curs: f.int("curs")?,
            pla: f.string("pla")?,
            tipus: f.string("tipus")?,
            tipus_assignatura: f.string_or_default("tipus_assignatura")?,
            comentaris: f.string_or_default("comentaris")?,
            eslaboratori: f.string_or_default("eslaboratori")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Professor {
    pub id: i64,
    pub assignatures: Vec<String>,
    pub plans_estudi: Vec<String>,
    pub especialitats: Vec<String>,
    pub obfuscated_email: String,
    pub nom: String,
    pub cognoms: String,
    pub departament: String,
    pub futur_url: String,
    pub apren_url: String,
}

impl Professor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.nom, self.cognoms)
    }

    pub fn email(&self) -> String {
        self.obfuscated_email.replace("(at)", "@")
    }
}

impl Record for Professor {
    const NAME: &'static str = "Professor";

    fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let f = Fields::new(Self::NAME, value)?;
        Ok(Self {
            id: f.int("id")?,
            assignatures: f.string_list("assignatures")?,
            plans_estudi: f.string_list("plans_estudi")?,
            especialitats: f.string_list("especialitats")?,
            obfuscated_email: f.string("obfuscated_email")?,
            nom: f.string("nom")?,
            cognoms: f.string("cognoms")?,
            departament: f.string("departament")?,
            futur_url: f.string_or_default("futur_url")?,
            apren_url: f.string_or_default("apren_url")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classroom {
    pub id: String,
    pub reserves: String,
}

impl Classroom {
    /// Building letter, e.g. `A` for `A5001`; empty when the id has none.
    pub fn building(&self) -> String {
        match self.id.chars().next() {
            Some(first) if first.is_alphabetic() => first.to_string(),
            _ => String::new(),
        }
    }
}

impl Record for Classroom {
    const NAME: &'static str = "Classroom";

    fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let f = Fields::new(Self::NAME, value)?;
        Ok(Self {
            id: f.string("id")?,
            reserves: f.string("reserves")?,
        })
    }
}

/// A term (`quadrimestre`) such as `2025Q1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcademicTerm {
    pub id: String,
    pub url: String,
    pub actual: String,
    pub actual_horaris: String,
    pub classes: String,
    pub examens: String,
    pub assignatures: String,
}

impl AcademicTerm {
    pub fn is_current(&self) -> bool {
        self.actual == "S"
    }

    pub fn year(&self) -> Option<i32> {
        self.id.get(..4)?.parse().ok()
    }

    pub fn semester(&self) -> Option<u32> {
        self.id.chars().last()?.to_digit(10)
    }
}

impl Record for AcademicTerm {
    const NAME: &'static str = "AcademicTerm";

    fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let f = Fields::new(Self::NAME, value)?;
        Ok(Self {
            id: f.string("id")?,
            url: f.string("url")?,
            actual: f.string("actual")?,
            actual_horaris: f.string("actual_horaris")?,
            classes: f.string("classes")?,
            examens: f.string("examens")?,
            assignatures: f.string("assignatures")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsItem {
    pub titol: String,
    pub link: String,
    pub descripcio: String,
    pub data_publicacio: NaiveDateTime,
}

impl NewsItem {
    pub fn plain_description(&self) -> String {
        strip_tags(&self.descripcio)
    }
}

impl Record for NewsItem {
    const NAME: &'static str = "NewsItem";

    fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let f = Fields::new(Self::NAME, value)?;
        Ok(Self {
            titol: f.string("titol")?,
            link: f.string("link")?,
            descripcio: f.string("descripcio")?,
            data_publicacio: f.datetime("data_publicacio")?,
        })
    }
}

/// The signed-in user (`/jo`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub username: String,
    pub nom: String,
    pub cognoms: String,
    pub email: String,
    pub foto: String,
    pub tipus: String,
    pub plans_estudi: Vec<String>,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.nom, self.cognoms)
    }

    pub fn is_student(&self) -> bool {
        self.tipus.eq_ignore_ascii_case("estudiant")
    }

    pub fn is_professor(&self) -> bool {
        self.tipus.eq_ignore_ascii_case("professor")
    }
}

impl Record for UserProfile {
    const NAME: &'static str = "UserProfile";

    fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let f = Fields::new(Self::NAME, value)?;
        Ok(Self {
            username: f.string("username")?,
            nom: f.string("nom")?,
            cognoms: f.string("cognoms")?,
            email: f.string("email")?,
            foto: f.string_or_default("foto")?,
            tipus: f.opt_string("tipus")?.unwrap_or_else(|| "estudiant".to_string()),
            plans_estudi: f.string_list("plans_estudi")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserCourse {
    pub id: String,
    pub url: String,
    pub nom: String,
    pub credits: f64,
    pub quadrimestre: String,
    pub grup: String,
    pub nota: Option<f64>,
    pub qualificacio: String,
    pub convocatoria: String,
}

impl UserCourse {
    /// A numeric grade of 5 or more, or a letter grade from A to D.
    pub fn is_passed(&self) -> bool {
        match self.nota {
            Some(nota) => nota >= 5.0,
            None => matches!(
                self.qualificacio.to_ascii_uppercase().as_str(),
                "A" | "B" | "C" | "D"
            ),
        }
    }
}

impl Record for UserCourse {
    const NAME: &'static str = "UserCourse";

    fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let f = Fields::new(Self::NAME, value)?;
        Ok(Self {
            id: f.string("id")?,
            url: f.string_or_default("url")?,
            nom: f.string("nom")?,
            credits: f.float("credits")?,
            quadrimestre: f.string_or_default("quadrimestre")?,
            grup: f.string_or_default("grup")?,
            nota: f.opt_float("nota")?,
            qualificacio: f.string_or_default("qualificacio")?,
            convocatoria: f.string_or_default("convocatoria")?,
        })
    }
}

/// One weekly slot of the user's timetable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserClass {
    pub codi_assig: String,
    pub nom_assig: String,
    pub grup: String,
    /// 1 is Monday, 7 is Sunday.
    pub dia_setmana: i64,
    pub inici: String,
    pub fi: String,
    pub dupinici: String,
    pub tipus: String,
    pub aules: String,
}

impl UserClass {
    pub fn day_name(&self) -> &'static str {
        const DAYS: [&str; 7] = [
            "Monday",
            "Tuesday",
            "Wednesday",
            "Thursday",
            "Friday",
            "Saturday",
            "Sunday",
        ];
        usize::try_from(self.dia_setmana)
            .ok()
            .and_then(|day| day.checked_sub(1))
            .and_then(|index| DAYS.get(index).copied())
            .unwrap_or("Unknown")
    }

    pub fn class_type_name(&self) -> String {
        match self.tipus.to_ascii_uppercase().as_str() {
            "T" => "Theory".to_string(),
            "L" => "Lab".to_string(),
            "P" => "Problems".to_string(),
            "S" => "Seminar".to_string(),
            _ => self.tipus.clone(),
        }
    }
}

impl Record for UserClass {
    const NAME: &'static str = "UserClass";

    fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let f = Fields::new(Self::NAME, value)?;
        Ok(Self {
            codi_assig: f.string("codi_assig")?,
            nom_assig: f.string_or_default("nom_assig")?,
            grup: f.string("grup")?,
            dia_setmana: f.int("dia_setmana")?,
            inici: f.string("inici")?,
            fi: f.string_or_default("fi")?,
            dupinici: f.string_or_default("dupinici")?,
            tipus: f.string("tipus")?,
            aules: f.string("aules")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub nom: String,
    pub url: String,
    pub tipus_mime: String,
    /// Size in bytes.
    pub mida: i64,
    pub data_modificacio: Option<NaiveDateTime>,
}

impl Record for Attachment {
    const NAME: &'static str = "Attachment";

    fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let f = Fields::new(Self::NAME, value)?;
        Ok(Self {
            nom: f.string_or_default("nom")?,
            url: f.string_or_default("url")?,
            tipus_mime: f.string_or_default("tipus_mime")?,
            mida: f.int_or("mida", 0)?,
            data_modificacio: f.opt_datetime("data_modificacio")?,
        })
    }
}

/// A course notice (`avis`) addressed to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserNotice {
    pub id: i64,
    pub titol: String,
    pub codi_assig: String,
    pub text: String,
    pub data_insercio: NaiveDateTime,
    pub data_modificacio: Option<NaiveDateTime>,
    pub adjunts: Vec<Attachment>,
}

impl UserNotice {
    pub fn plain_text(&self) -> String {
        strip_tags(&self.text)
    }
}

impl Record for UserNotice {
    const NAME: &'static str = "UserNotice";

    fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let f = Fields::new(Self::NAME, value)?;
        Ok(Self {
            id: f.int("id")?,
            titol: f.string("titol")?,
            codi_assig: f.string("codi_assig")?,
            text: f.string("text")?,
            data_insercio: f.datetime("data_insercio")?,
            data_modificacio: f.opt_datetime("data_modificacio")?,
            adjunts: f.records("adjunts")?,
        })
    }
}
